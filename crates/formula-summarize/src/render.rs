//! Text renderings of summarize results (Markdown tables and Mermaid charts).
//!
//! Each renderer consumes its input once, so it can be fed a [`Summarized`](crate::Summarized)
//! sequence after unwrapping its items.
use crate::key::GroupKey;

/// Render results as a Markdown table: one column per key field, then `value_columns`.
///
/// `values` must return one cell per value column.
pub fn markdown_table<K, R>(
    results: impl IntoIterator<Item = (K, R)>,
    value_columns: &[&str],
    values: impl Fn(&R) -> Vec<String>,
) -> String
where
    K: GroupKey,
{
    let mut headers: Vec<String> = K::FIELDS.iter().map(|name| escape_cell(name)).collect();
    headers.extend(value_columns.iter().map(|name| escape_cell(name)));

    let mut out = String::new();
    push_row(&mut out, &headers);
    push_row(&mut out, &vec!["---".to_string(); headers.len()]);

    for (key, result) in results {
        let mut cells: Vec<String> = key
            .fields()
            .iter()
            .map(|value| escape_cell(&value.to_string()))
            .collect();
        cells.extend(values(&result).iter().map(|cell| escape_cell(cell)));
        push_row(&mut out, &cells);
    }
    out
}

/// Render results as a Mermaid pie chart.
pub fn mermaid_pie_chart<K, R>(
    results: impl IntoIterator<Item = (K, R)>,
    title: &str,
    label: impl Fn(&K) -> String,
    value: impl Fn(&R) -> String,
) -> String {
    let mut out = format!("pie title {title}\n");
    for (key, result) in results {
        out.push_str(&format!(
            "    {} : {}\n",
            quote(&label(&key)),
            value(&result)
        ));
    }
    out
}

/// Chart and axis titles for [`mermaid_bar_chart`] / [`mermaid_line_chart`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartAxes<'s> {
    pub title: &'s str,
    pub x_title: &'s str,
    pub y_title: &'s str,
}

pub fn mermaid_bar_chart<K, R>(
    results: impl IntoIterator<Item = (K, R)>,
    axes: &ChartAxes<'_>,
    x_value: impl Fn(&K) -> String,
    y_value: impl Fn(&R) -> String,
) -> String {
    xy_chart(results, axes, "bar", x_value, y_value)
}

pub fn mermaid_line_chart<K, R>(
    results: impl IntoIterator<Item = (K, R)>,
    axes: &ChartAxes<'_>,
    x_value: impl Fn(&K) -> String,
    y_value: impl Fn(&R) -> String,
) -> String {
    xy_chart(results, axes, "line", x_value, y_value)
}

fn xy_chart<K, R>(
    results: impl IntoIterator<Item = (K, R)>,
    axes: &ChartAxes<'_>,
    series: &str,
    x_value: impl Fn(&K) -> String,
    y_value: impl Fn(&R) -> String,
) -> String {
    let mut x_items = Vec::new();
    let mut y_items = Vec::new();
    for (key, result) in results {
        x_items.push(quote(&x_value(&key)));
        y_items.push(y_value(&result));
    }

    let mut out = String::from("xychart-beta\n");
    out.push_str(&format!("    title {}\n", quote(axes.title)));
    out.push_str(&format!(
        "    x-axis {} [{}]\n",
        quote(axes.x_title),
        x_items.join(", ")
    ));
    out.push_str(&format!("    y-axis {}\n", quote(axes.y_title)));
    out.push_str(&format!("    {series} [{}]\n", y_items.join(", ")));
    out
}

fn push_row(out: &mut String, cells: &[String]) {
    out.push_str("| ");
    out.push_str(&cells.join(" | "));
    out.push_str(" |\n");
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

// Mermaid labels are double-quoted; embedded quotes use the `#quot;` entity.
fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "#quot;"))
}
