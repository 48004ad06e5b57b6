//! Serialisable views of the world and the value table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agent::{ActionValues, ValueTable};
use crate::position::Position;

/// Grid as rows of cell strings, bonus values inlined as `"bonus:<v>"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Vec<String>>,
}

/// Value row keyed by action name
pub type ActionValuesWire = BTreeMap<String, f64>;

/// Value table keyed by `"x,y"` then action name
pub type ValueTableWire = BTreeMap<String, ActionValuesWire>;

pub fn row_to_wire(row: &ActionValues) -> ActionValuesWire {
    row.iter().map(|(a, v)| (a.as_str().to_string(), *v)).collect()
}

pub fn table_to_wire(table: &ValueTable) -> ValueTableWire {
    table.iter().map(|(pos, row)| (pos.key(), row_to_wire(row))).collect()
}

/// Single-entry table for one state, as pushed in live deltas
pub fn row_delta(state: Position, row: &ActionValues) -> ValueTableWire {
    BTreeMap::from([(state.key(), row_to_wire(row))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use std::collections::HashMap;

    #[test]
    fn test_table_keys() {
        let mut table: ValueTable = HashMap::new();
        table.insert(
            Position::new(3, 1),
            BTreeMap::from([(Action::Up, 1.5), (Action::Right, -0.25)]),
        );
        let wire = table_to_wire(&table);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["3,1"]["UP"], 1.5);
        assert_eq!(json["3,1"]["RIGHT"], -0.25);
    }
}
