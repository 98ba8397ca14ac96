use formula_summarize::render::{
    markdown_table, mermaid_bar_chart, mermaid_line_chart, mermaid_pie_chart, ChartAxes,
};
use formula_summarize::{group_key, Filter, SummarizeColumns, SummarizeResult};
use pretty_assertions::assert_eq;

group_key! {
    struct RegionKey {
        region: String,
        year: i32,
    }
}

struct Sale {
    region: &'static str,
    year: i32,
    amount: f64,
}

fn totals() -> Vec<(RegionKey, f64)> {
    let sales = vec![
        Sale { region: "East", year: 2023, amount: 10.5 },
        Sale { region: "West", year: 2023, amount: 4.0 },
        Sale { region: "East", year: 2023, amount: 1.5 },
        Sale { region: "East", year: 2024, amount: 7.0 },
    ];
    let totals = SummarizeColumns::new(&sales, |sale: &Sale| RegionKey {
        region: sale.region.to_string(),
        year: sale.year,
    })
    .filter(Filter::none())
    .evaluate(|rows: &[&Sale], _: &RegionKey| {
        Some(rows.iter().map(|sale| sale.amount).sum::<f64>())
    })
    .unwrap()
    .collect::<SummarizeResult<_>>()
    .unwrap();
    totals
}

#[test]
fn markdown_table_has_one_column_per_key_field() {
    let table = markdown_table(totals(), &["total"], |total: &f64| vec![total.to_string()]);
    assert_eq!(
        table,
        "| region | year | total |\n\
         | --- | --- | --- |\n\
         | East | 2023 | 12 |\n\
         | West | 2023 | 4 |\n\
         | East | 2024 | 7 |\n"
    );
}

#[test]
fn pie_chart_lists_one_slice_per_group() {
    let chart = mermaid_pie_chart(
        totals(),
        "Sales",
        |key: &RegionKey| format!("{} {}", key.region, key.year),
        |total: &f64| total.to_string(),
    );
    assert_eq!(
        chart,
        "pie title Sales\n    \"East 2023\" : 12\n    \"West 2023\" : 4\n    \"East 2024\" : 7\n"
    );
}

#[test]
fn xy_charts_share_the_axis_layout() {
    let axes = ChartAxes {
        title: "Sales by region",
        x_title: "Region",
        y_title: "Total",
    };
    let label = |key: &RegionKey| format!("{} {}", key.region, key.year);
    let value = |total: &f64| total.to_string();

    let bar = mermaid_bar_chart(totals(), &axes, label, value);
    assert_eq!(
        bar,
        "xychart-beta\n    title \"Sales by region\"\n    x-axis \"Region\" [\"East 2023\", \"West 2023\", \"East 2024\"]\n    y-axis \"Total\"\n    bar [12, 4, 7]\n"
    );

    let line = mermaid_line_chart(totals(), &axes, label, value);
    assert!(line.ends_with("    line [12, 4, 7]\n"));
    assert_eq!(
        line.lines().take(4).collect::<Vec<_>>(),
        bar.lines().take(4).collect::<Vec<_>>()
    );
}
