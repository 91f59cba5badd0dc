use std::fmt::Write as _;

use crate::catalog::{
    Catalog, EntityKind, FORMATION_SLOTS, MASTER_SLOTS, SHOP_SLOTS, TRADE_SLOTS,
};

fn referenced_name(catalog: &Catalog, kind: EntityKind, value: i64) -> String {
    if value < 0 {
        return "Nothing".to_string();
    }
    match catalog.record(kind, value as usize) {
        Ok(record) => record.name.clone(),
        Err(_) => format!("#{value}"),
    }
}

fn lookup(catalog: &Catalog, kind: EntityKind, index: usize, field: &str) -> i64 {
    catalog
        .record(kind, index)
        .and_then(|r| r.current(field))
        .unwrap_or(0)
}

/// Pure per-record summary for the spoiler report; must never fail, so any
/// dangling reference renders as its raw value.
pub fn record_summary(catalog: &Catalog, kind: EntityKind, index: usize) -> String {
    let Ok(record) = catalog.record(kind, index) else {
        return String::new();
    };
    match kind {
        EntityKind::Shop => {
            let mut s = format!("SHOP {index:0>2X}\n");
            for slot in 0..SHOP_SLOTS {
                let kind_value = record
                    .current(&format!("slot{slot}_kind"))
                    .unwrap_or(0);
                let item = record
                    .current(&format!("slot{slot}_item"))
                    .unwrap_or(-1);
                if item < 0 {
                    continue;
                }
                if let Ok(slot_kind) = EntityKind::from_slot_kind(kind_value) {
                    let name = referenced_name(catalog, slot_kind, item);
                    let price = lookup(catalog, slot_kind, item as usize, "price");
                    let _ = writeln!(s, "  {name:12} {price:>5}");
                }
            }
            s.trim_end().to_string()
        }
        EntityKind::Formation => {
            let rate = record.current("appearance_rate").unwrap_or(0);
            let mut s = format!("FORMATION {index:0>3X} ({rate}): ");
            let mut counts: Vec<(String, usize)> = Vec::new();
            for slot in 0..FORMATION_SLOTS {
                let value = record.current(&format!("monster{slot}")).unwrap_or(-1);
                if value < 0 {
                    continue;
                }
                let name = referenced_name(catalog, EntityKind::Monster, value);
                match counts.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((name, 1)),
                }
            }
            if counts.is_empty() {
                s.push_str("Nothing");
            } else {
                counts.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
                let parts: Vec<String> = counts
                    .iter()
                    .map(|(name, count)| format!("{name} x{count}"))
                    .collect();
                s.push_str(&parts.join(", "));
            }
            s
        }
        EntityKind::Trade => {
            let reward = record.current("reward_item").unwrap_or(-1);
            let mut s = format!(
                "TRADE {index:0>2X} -> {}\n",
                referenced_name(catalog, EntityKind::Item, reward)
            );
            for slot in 0..TRADE_SLOTS {
                let item = record.current(&format!("cost{slot}_item")).unwrap_or(-1);
                let qty = record.current(&format!("cost{slot}_qty")).unwrap_or(0);
                if item < 0 || qty <= 0 {
                    continue;
                }
                let _ = writeln!(
                    s,
                    "  {:12} x{qty}",
                    referenced_name(catalog, EntityKind::Item, item)
                );
            }
            s.trim_end().to_string()
        }
        EntityKind::MasterSkills => {
            let mut s = format!("MASTER {index:0>2X} {}\n", record.name);
            for slot in 0..MASTER_SLOTS {
                let skill = record.current(&format!("skill{slot}")).unwrap_or(-1);
                if skill < 0 {
                    continue;
                }
                let level = record.current(&format!("level{slot}")).unwrap_or(0);
                let _ = writeln!(
                    s,
                    "  Lv{level:>2} {}",
                    referenced_name(catalog, EntityKind::Ability, skill)
                );
            }
            s.trim_end().to_string()
        }
        _ => {
            let mut s = format!(
                "{} {index:0>2X} {}",
                kind.table_name().to_ascii_uppercase(),
                record.name
            );
            for def in kind.schema() {
                let value = record.current(def.name).unwrap_or(0);
                let _ = write!(s, " {}={value}", def.name);
            }
            s
        }
    }
}

/// The full spoiler text: every table, every record, current values.
pub fn spoiler(catalog: &Catalog) -> String {
    let mut out = String::new();
    for kind in EntityKind::ALL {
        if catalog.is_empty(kind) {
            continue;
        }
        let _ = writeln!(out, "=== {} ===", kind.table_name());
        for index in 0..catalog.len(kind) {
            let _ = writeln!(out, "{}", record_summary(catalog, kind, index));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;
    use std::collections::HashMap as Map;

    fn shop_catalog() -> Catalog {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            vec![
                Record::new(EntityKind::Item, 0, "Herb".to_string(), vec![20, 5, 0])
                    .unwrap(),
                Record::new(EntityKind::Item, 1, "Vitamin".to_string(), vec![100, 40, 0])
                    .unwrap(),
            ],
        );
        let mut shop_values = Vec::new();
        for slot in 0..SHOP_SLOTS {
            shop_values.push(0);
            shop_values.push(if slot < 2 { slot as i64 } else { -1 });
        }
        tables.insert(
            EntityKind::Shop,
            vec![Record::new(EntityKind::Shop, 0, "McNeil".to_string(), shop_values)
                .unwrap()],
        );
        Catalog::new(tables).unwrap()
    }

    #[test]
    fn shop_summary_lists_stocked_slots_with_prices() {
        let catalog = shop_catalog();
        let summary = record_summary(&catalog, EntityKind::Shop, 0);
        assert!(summary.starts_with("SHOP 00"));
        assert!(summary.contains("Herb"));
        assert!(summary.contains("Vitamin"));
        assert!(summary.contains("100"));
    }

    #[test]
    fn spoiler_covers_every_non_empty_table() {
        let catalog = shop_catalog();
        let text = spoiler(&catalog);
        assert!(text.contains("=== items ==="));
        assert!(text.contains("=== shops ==="));
        assert!(!text.contains("=== monsters ==="));
    }

    #[test]
    fn summary_never_fails_on_dangling_references() {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            vec![Record::new(EntityKind::Item, 0, "Herb".to_string(), vec![20, 5, 0])
                .unwrap()],
        );
        let mut shop_values = Vec::new();
        for _ in 0..SHOP_SLOTS {
            shop_values.push(0);
            shop_values.push(500);
        }
        tables.insert(
            EntityKind::Shop,
            vec![Record::new(EntityKind::Shop, 0, "Broken".to_string(), shop_values)
                .unwrap()],
        );
        let catalog = Catalog::new(tables).unwrap();
        let summary = record_summary(&catalog, EntityKind::Shop, 0);
        assert!(summary.contains("#500"));
    }
}
