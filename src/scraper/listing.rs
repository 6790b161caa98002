//! Market-watch listing page parser.
//!
//! The portal renders one primary data table with, per column position:
//! symbol/name, sector code, listing venue, LDCP, open, high, low, current,
//! change, change %, volume. Numeric cells carry a machine-readable
//! `data-order` attribute which is preferred over the visible text. The
//! markup is not guaranteed stable, so the preferred selector falls back to
//! the first table in the document.

use crate::models::MarketWatchRow;
use crate::scraper::text::{non_empty, normalise_symbol, parse_count, parse_number};
use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static PREFERRED_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.tbl").expect("listing table selector"));
static ANY_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector"));
static BOLD: Lazy<Selector> = Lazy::new(|| Selector::parse("b, strong").expect("bold selector"));

/// Parse the listing page into per-symbol rows, in document order.
/// Rows without a resolvable symbol are dropped silently — sparse or
/// suspended listings are expected. Failing to locate any table is fatal.
pub fn parse_listing(html: &str) -> Result<Vec<MarketWatchRow>> {
    let doc = Html::parse_document(html);

    let table = doc
        .select(&PREFERRED_TABLE)
        .next()
        .or_else(|| doc.select(&ANY_TABLE).next())
        .context("market watch table not found on listing page")?;

    let now = Utc::now().naive_utc();
    let mut rows = Vec::new();

    for tr in table.select(&TR) {
        let cells: Vec<ElementRef> = tr.select(&TD).collect();

        // Header rows carry <th> cells and yield no <td>s
        if cells.len() < 4 {
            continue;
        }

        let Some(symbol) = cell_symbol(&cells[0]) else {
            continue;
        };

        let name = cells[0]
            .value()
            .attr("title")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| symbol.clone());

        rows.push(MarketWatchRow {
            symbol,
            name,
            sector_code: cells.get(1).and_then(|c| non_empty(&cell_text(c))),
            sector_name: cells
                .get(1)
                .and_then(|c| c.value().attr("title"))
                .and_then(non_empty),
            listed_in: cells.get(2).and_then(|c| non_empty(&cell_text(c))),
            ldcp: cells.get(3).and_then(cell_number),
            open: cells.get(4).and_then(cell_number),
            high: cells.get(5).and_then(cell_number),
            low: cells.get(6).and_then(cell_number),
            current: cells.get(7).and_then(cell_number),
            change: cells.get(8).and_then(cell_number),
            change_pct: cells.get(9).and_then(cell_number),
            volume: cells.get(10).and_then(cell_count),
            scraped_at: now,
        });
    }

    Ok(rows)
}

/// Symbol from the machine-readable attribute, else from a bolded text node.
fn cell_symbol(cell: &ElementRef) -> Option<String> {
    if let Some(attr) = cell.value().attr("data-order") {
        let s = attr.trim();
        if !s.is_empty() {
            return Some(normalise_symbol(s));
        }
    }

    cell.select(&BOLD)
        .next()
        .map(|b| b.text().collect::<String>())
        .and_then(|t| non_empty(&t))
        .map(|s| normalise_symbol(&s))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Numeric cells prefer `data-order` over the visible text.
fn cell_number(cell: &ElementRef) -> Option<f64> {
    if let Some(attr) = cell.value().attr("data-order") {
        if let Some(v) = parse_number(attr) {
            return Some(v);
        }
    }
    parse_number(&cell_text(cell))
}

fn cell_count(cell: &ElementRef) -> Option<i64> {
    if let Some(attr) = cell.value().attr("data-order") {
        if let Some(v) = parse_count(attr) {
            return Some(v);
        }
    }
    parse_count(&cell_text(cell))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_html(table_class: &str) -> String {
        format!(
            r#"<html><body>
            <table class="{table_class}">
              <thead><tr><th>SYMBOL</th><th>SECTOR</th><th>LISTED IN</th><th>LDCP</th>
                <th>OPEN</th><th>HIGH</th><th>LOW</th><th>CURRENT</th>
                <th>CHANGE</th><th>CHANGE (%)</th><th>VOLUME</th></tr></thead>
              <tbody>
                <tr>
                  <td data-order="ABC" title="ABC Industries &amp; Co">ABC</td>
                  <td title="Cement">0801</td><td>XD</td>
                  <td data-order="100.00">100.00</td>
                  <td>100.50</td><td>102.00</td><td>99.75</td>
                  <td data-order="101.50">101.50</td>
                  <td>1.50</td><td>1.50%</td>
                  <td data-order="10000">10,000</td>
                </tr>
                <tr>
                  <td><b>DEF</b></td>
                  <td>0802</td><td>XD</td>
                  <td>55.00</td><td>-</td><td>-</td><td>-</td>
                  <td>54.10</td><td>(0.90)</td><td>(1.64)</td><td>1.2M</td>
                </tr>
                <tr>
                  <td></td>
                  <td>0803</td><td>XD</td>
                  <td>1.00</td><td>1.00</td><td>1.00</td><td>1.00</td>
                  <td>1.00</td><td>0.00</td><td>0.00</td><td>0</td>
                </tr>
              </tbody>
            </table>
            </body></html>"#
        )
    }

    #[test]
    fn test_parses_rows_in_document_order() {
        let rows = parse_listing(&listing_html("tbl")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "ABC");
        assert_eq!(rows[1].symbol, "DEF");
    }

    #[test]
    fn test_prefers_data_order_attribute() {
        let rows = parse_listing(&listing_html("tbl")).unwrap();
        let abc = &rows[0];
        assert_eq!(abc.name, "ABC Industries & Co");
        assert_eq!(abc.ldcp, Some(100.0));
        assert_eq!(abc.current, Some(101.50));
        assert_eq!(abc.change, Some(1.50));
        assert_eq!(abc.change_pct, Some(1.50));
        assert_eq!(abc.volume, Some(10_000));
        assert_eq!(abc.sector_code.as_deref(), Some("0801"));
        assert_eq!(abc.sector_name.as_deref(), Some("Cement"));
    }

    #[test]
    fn test_bold_symbol_and_dash_cells() {
        let rows = parse_listing(&listing_html("tbl")).unwrap();
        let def = &rows[1];
        assert_eq!(def.symbol, "DEF");
        assert_eq!(def.open, None);
        assert_eq!(def.change, Some(-0.90));
        assert_eq!(def.change_pct, Some(-1.64));
        assert_eq!(def.volume, Some(1_200_000));
    }

    #[test]
    fn test_row_without_symbol_is_dropped() {
        let rows = parse_listing(&listing_html("tbl")).unwrap();
        assert!(rows.iter().all(|r| !r.symbol.is_empty()));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_falls_back_to_first_table() {
        let rows = parse_listing(&listing_html("quotes")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "ABC");
    }

    #[test]
    fn test_no_table_is_fatal() {
        assert!(parse_listing("<html><body><p>maintenance</p></body></html>").is_err());
    }
}
