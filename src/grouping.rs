use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{GestureGroup, NONE_LABELS};

/// Grupos por defecto para las etiquetas del clasificador de mano
const DEFAULT_GROUPS: &[(&str, &[&str])] = &[
    ("palm_group", &["palm", "palm_moved"]),
    ("fist_group", &["fist", "fist_moved"]),
    ("ok_group", &["ok", "c_shape"]),
    ("l_group", &["l_shape"]),
    ("thumb_group", &["thumb"]),
    ("index_group", &["index"]),
    ("down_group", &["down"]),
];

/// Tabla estática etiqueta → grupo canónico.
///
/// Las etiquetas se comparan sin distinguir mayúsculas y sin espacios
/// alrededor. Una etiqueta igual al nombre de un grupo conocido se mapea a
/// ese grupo. `none`, `uncertain` y `desconocido` nunca se mapean.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    by_label: HashMap<String, GestureGroup>,
    groups: BTreeSet<GestureGroup>,
}

impl GroupTable {
    /// Tabla vacía: ninguna etiqueta tiene grupo
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tabla con los grupos del clasificador de mano
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        for (group, labels) in DEFAULT_GROUPS {
            for label in labels.iter() {
                table.insert(label, GestureGroup::new(*group));
            }
        }
        table
    }

    /// Construye la tabla desde la sección `gesture_groups` del documento
    pub fn from_groups(groups: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::empty();
        for (group, labels) in groups {
            let group = GestureGroup::new(normalize(group));
            table.groups.insert(group.clone());
            for label in labels {
                table.insert(label, group.clone());
            }
        }
        table
    }

    pub fn insert(&mut self, label: &str, group: GestureGroup) {
        let label = normalize(label);
        if NONE_LABELS.contains(&label.as_str()) {
            return;
        }
        self.groups.insert(group.clone());
        self.by_label.insert(label, group);
    }

    pub fn lookup(&self, label: &str) -> Option<GestureGroup> {
        let label = normalize(label);
        if label.is_empty() || NONE_LABELS.contains(&label.as_str()) {
            return None;
        }
        if let Some(group) = self.by_label.get(&label) {
            return Some(group.clone());
        }
        self.groups.get(label.as_str()).cloned()
    }

    pub fn groups(&self) -> &BTreeSet<GestureGroup> {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_gestures_share_group() {
        let table = GroupTable::with_defaults();
        assert_eq!(table.lookup("ok"), Some(GestureGroup::new("ok_group")));
        assert_eq!(table.lookup("c_shape"), Some(GestureGroup::new("ok_group")));
        assert_eq!(table.lookup("Palm_Moved "), Some(GestureGroup::new("palm_group")));
    }

    #[test]
    fn test_unmapped_and_none_labels() {
        let table = GroupTable::with_defaults();
        assert_eq!(table.lookup("wave"), None);
        assert_eq!(table.lookup("none"), None);
        assert_eq!(table.lookup("uncertain"), None);
        assert_eq!(table.lookup(""), None);
    }

    #[test]
    fn test_group_name_maps_to_itself() {
        let table = GroupTable::with_defaults();
        assert_eq!(table.lookup("fist_group"), Some(GestureGroup::new("fist_group")));
    }

    #[test]
    fn test_from_groups_replaces_whole_table() {
        let mut groups = BTreeMap::new();
        groups.insert("swipe_group".to_string(), vec!["swipe".to_string()]);
        let table = GroupTable::from_groups(&groups);
        assert_eq!(table.lookup("swipe"), Some(GestureGroup::new("swipe_group")));
        assert_eq!(table.lookup("palm"), None);
        assert_eq!(table.len(), 1);
    }
}
