use crate::entities::recipe_line;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// On-hand quantity per inventory item, snapshotted for one calculation.
pub type StockLevels = HashMap<Uuid, Decimal>;

/// Maximum units of a menu item sellable against the given stock.
///
/// For each recipe line the cap is `floor(on_hand / quantity_per_unit)`, a
/// missing stock entry counting as zero; the result is the minimum across
/// lines and never negative. An empty recipe has no defined cap and yields
/// `None`: menu creation requires at least one line, so this only arises for
/// legacy rows, which callers treat as unconstrained.
///
/// Pure function; callers re-evaluate it against current stock on every use.
pub fn max_sellable(recipe: &[recipe_line::Model], stock: &StockLevels) -> Option<u32> {
    if recipe.is_empty() {
        return None;
    }

    let mut cap = u32::MAX;
    for line in recipe {
        // Creation validation rejects non-positive per-unit quantities; a
        // line carrying one anyway imposes no constraint.
        if line.quantity_per_unit <= Decimal::ZERO {
            continue;
        }

        let line_cap = stock
            .get(&line.inventory_item_id)
            .map(|on_hand| {
                (on_hand / line.quantity_per_unit)
                    .floor()
                    .to_u32()
                    .unwrap_or(0)
            })
            .unwrap_or(0);

        cap = cap.min(line_cap);
    }

    Some(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn line(inventory_item_id: Uuid, per_unit: Decimal) -> recipe_line::Model {
        recipe_line::Model {
            id: Uuid::new_v4(),
            menu_item_id: Uuid::new_v4(),
            inventory_item_id,
            quantity_per_unit: per_unit,
        }
    }

    #[test]
    fn cap_is_minimum_across_lines() {
        let bun = Uuid::new_v4();
        let patty = Uuid::new_v4();
        let recipe = vec![line(bun, dec!(2)), line(patty, dec!(1))];

        let mut stock = StockLevels::new();
        stock.insert(bun, dec!(10)); // 5 burgers worth of buns
        stock.insert(patty, dec!(3)); // 3 burgers worth of patties

        assert_eq!(max_sellable(&recipe, &stock), Some(3));
    }

    #[rstest]
    #[case::exact_multiple(dec!(6), dec!(2), Some(3))]
    #[case::fractional_floors(dec!(1), dec!(0.3), Some(3))]
    #[case::less_than_one_unit(dec!(1.5), dec!(2), Some(0))]
    #[case::negative_stock_clamps_to_zero(dec!(-4), dec!(1), Some(0))]
    fn single_line_cap(
        #[case] on_hand: Decimal,
        #[case] per_unit: Decimal,
        #[case] expected: Option<u32>,
    ) {
        let bun = Uuid::new_v4();
        let recipe = vec![line(bun, per_unit)];

        let mut stock = StockLevels::new();
        stock.insert(bun, on_hand);

        assert_eq!(max_sellable(&recipe, &stock), expected);
    }

    #[test]
    fn missing_stock_entry_counts_as_zero() {
        let bun = Uuid::new_v4();
        let recipe = vec![line(bun, dec!(2))];
        let stock = StockLevels::new();

        assert_eq!(max_sellable(&recipe, &stock), Some(0));
    }

    #[test]
    fn empty_recipe_has_no_cap() {
        let stock = StockLevels::new();
        assert_eq!(max_sellable(&[], &stock), None);
    }
}
