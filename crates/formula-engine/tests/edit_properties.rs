use formula_engine::ast::NodeKind;
use formula_engine::{Formula, Sheet};
use formula_model::{Point, MAX_GRID_SIZE};
use proptest::prelude::*;

fn cell_ref() -> impl Strategy<Value = String> {
    (any::<bool>(), 0u8..10, any::<bool>(), 1u32..20).prop_map(|(abs_x, x, abs_y, y)| {
        format!(
            "{}{}{}{}",
            if abs_x { "$" } else { "" },
            (b'A' + x) as char,
            if abs_y { "$" } else { "" },
            y
        )
    })
}

fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        cell_ref(),
        (cell_ref(), cell_ref()).prop_map(|(a, b)| format!("{a}:{b}")),
        Just("\"x\"".to_string()),
        Just("TRUE".to_string()),
    ];
    leaf.prop_recursive(6, 48, 3, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec!["+", "-", "*", "/", "^", "&", "=", "<>", "<="]),
                inner.clone()
            )
                .prop_map(|(a, op, b)| format!("{a}{op}{b}")),
            inner.clone().prop_map(|a| format!("({a})")),
            inner.clone().prop_map(|a| format!("-{a}")),
            inner.clone().prop_map(|a| format!("{a}%")),
            prop::collection::vec(inner.clone(), 1..4)
                .prop_map(|args| format!("SUM({})", args.join(","))),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, t, f)| format!("IF({c},{t},{f})")),
        ]
    })
}

fn reconstructed(text: &str, at: Point) -> String {
    let (formula, refs) = Formula::parse(text, at, MAX_GRID_SIZE);
    formula.reconstruct_at(&refs, at, MAX_GRID_SIZE)
}

fn is_parse_error(text: &str, at: Point) -> bool {
    let (formula, _) = Formula::parse(text, at, MAX_GRID_SIZE);
    let found = formula
        .root()
        .children()
        .any(|child| matches!(child.kind(), NodeKind::ParseError { .. }));
    found
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

    #[test]
    fn reconstructed_text_parses_back_to_itself(expr in expression(), x in 0u32..30, y in 0u32..30) {
        let at = Point::new(x, y);
        let text = format!("={expr}");
        prop_assert!(!is_parse_error(&text, at), "{text}");
        let once = reconstructed(&text, at);
        let twice = reconstructed(&once, at);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn insert_then_delete_rows_restores_formulas(
        row in 0u32..40,
        refs in prop::collection::vec((0u32..6, 0u32..40), 1..4),
        before in 0u32..45,
        count in 1u32..10,
    ) {
        let mut sheet = Sheet::new();
        let terms: Vec<String> = refs
            .iter()
            .map(|&(x, y)| format!("{}{}", (b'B' + x as u8) as char, y + 1))
            .collect();
        let at = Point::new(0, row);
        sheet.set_formula_cell(at, &format!("={}", terms.join("+"))).unwrap();
        for &(x, y) in &refs {
            sheet.set_value_cell(Point::new(x + 1, y), f64::from(y)).unwrap();
        }
        let text = sheet.get_formula_info(at).unwrap().text;
        let value = sheet.get_value(at);

        sheet.insert_rows(before, count).unwrap();
        sheet.delete_rows(before, count).unwrap();

        let info = sheet.get_formula_info(at);
        prop_assert_eq!(info.map(|i| i.text), Some(text));
        prop_assert_eq!(sheet.get_value(at), value);
    }

    #[test]
    fn moving_a_formula_keeps_its_value(
        refs in prop::collection::vec((0u32..6, 0u32..20), 1..4),
        to_x in 10u32..20,
        to_y in 0u32..30,
    ) {
        let mut sheet = Sheet::new();
        for &(x, y) in &refs {
            sheet.set_value_cell(Point::new(x + 1, y), f64::from(x * 100 + y)).unwrap();
        }
        let terms: Vec<String> = refs
            .iter()
            .map(|&(x, y)| format!("{}{}", (b'B' + x as u8) as char, y + 1))
            .collect();
        sheet.set_formula_cell(Point::new(0, 0), &format!("={}", terms.join("+"))).unwrap();
        let value = sheet.get_value(Point::new(0, 0));

        let to = Point::new(to_x, to_y);
        sheet.move_cell(Point::new(0, 0), to).unwrap();
        prop_assert_eq!(sheet.get_value(to), value);
        prop_assert!(sheet.get_value(Point::new(0, 0)).is_blank());
    }
}
