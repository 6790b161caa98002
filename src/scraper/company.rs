//! Company detail page parser.
//!
//! The detail page has no guaranteed schema, so five independent sub-parses
//! run over one parsed document: identity, fundamentals, ratios, financial
//! statements, and equity. Values are collected from structured tables,
//! definition lists and labeled stat blocks in that fixed order, with a
//! regex sweep over the full page text as the last resort. Every field is
//! filled first-match-wins: once set, a later (possibly less specific)
//! match never overwrites it.

use crate::models::{
    CompanyFullData, CompanyInfo, EquityData, FinancialPeriod, FundamentalsData, PeriodType,
    RatiosData,
};
use crate::scraper::text::{non_empty, normalise_label, parse_number, set_if_absent};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("cell selector"));
static DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").expect("dt selector"));
static DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dd").expect("dd selector"));
static STAT_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".stats_item").expect("stats item selector"));
static STAT_LABEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".stats_label").expect("stats label selector"));
static STAT_VALUE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".stats_value").expect("stats value selector"));

static RE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("year regex"));
static RE_QUARTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:q([1-4])\s*[-/ ]?\s*((?:19|20)\d{2})|((?:19|20)\d{2})\s*[-/ ]?\s*q([1-4]))$")
        .expect("quarter regex")
});

/// Parse one detail page into the full per-company record set.
pub fn parse_company_page(html: &str, symbol: &str) -> CompanyFullData {
    let doc = Html::parse_document(html);
    let pairs = label_value_pairs(&doc);

    let info = parse_identity(&doc, symbol);

    let mut fundamentals = FundamentalsData::default();
    let mut ratios = RatiosData::default();
    let mut equity = EquityData::default();

    for (label, value) in &pairs {
        apply_fundamental(&mut fundamentals, label, value);
        apply_ratio(&mut ratios, label, value);
        apply_equity(&mut equity, label, value);
    }

    // Regex sweep over the raw page text fills anything still unset
    let text = page_text(&doc);
    sweep_fundamentals(&mut fundamentals, &text);

    let financials = parse_financials(&doc);

    // Equity section backfills fundamentals it duplicates
    set_if_absent(&mut fundamentals.market_cap, equity.market_cap);
    set_if_absent(&mut fundamentals.shares_outstanding, equity.shares_outstanding);
    set_if_absent(&mut fundamentals.free_float_shares, equity.free_float_shares);

    CompanyFullData {
        symbol: symbol.to_string(),
        info,
        fundamentals,
        ratios,
        financials,
        equity,
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

fn parse_identity(doc: &Html, symbol: &str) -> CompanyInfo {
    let mut info = CompanyInfo::default();

    for sel_str in &["h1.quote__name", ".company__name", "h1"] {
        if let Some(text) = select_text(doc, sel_str) {
            info.name = Some(text);
            break;
        }
    }

    for sel_str in &[".company__description", ".profile__text", "#profile p"] {
        if let Some(text) = select_text(doc, sel_str) {
            info.description = Some(text);
            break;
        }
    }

    for sel_str in &[".quote__sector", ".company__sector"] {
        if let Some(text) = select_text(doc, sel_str) {
            info.sector = Some(text);
            break;
        }
    }
    if info.sector.is_none() {
        info.sector = pair_lookup(doc, "sector");
    }

    info.logo_url = Some(resolve_logo(doc, symbol, info.name.as_deref()));
    info
}

/// Deterministic logo chain: page image → logo-by-domain lookup → generated
/// placeholder. Every company always ends up with some displayable URL.
fn resolve_logo(doc: &Html, symbol: &str, _name: Option<&str>) -> String {
    for sel_str in &["img.company__logo", ".company__header img", ".logo img"] {
        if let Ok(sel) = Selector::parse(sel_str) {
            if let Some(src) = doc.select(&sel).next().and_then(|el| el.value().attr("src")) {
                if !src.trim().is_empty() {
                    return src.trim().to_string();
                }
            }
        }
    }

    if let Some(website) = pair_lookup(doc, "website").or_else(|| pair_lookup(doc, "web")) {
        if let Some(domain) = extract_domain(&website) {
            return format!("https://logo.clearbit.com/{}", domain);
        }
    }

    placeholder_logo(symbol)
}

fn extract_domain(website: &str) -> Option<String> {
    let candidate = website.trim();
    let with_scheme = if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("https://{}", candidate)
    };
    let url = url::Url::parse(&with_scheme).ok()?;
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
        .filter(|h| h.contains('.'))
}

/// Two-letter monogram on a background color chosen by a stable hash of the
/// symbol, so repeated scrapes generate the identical URL.
pub fn placeholder_logo(symbol: &str) -> String {
    const PALETTE: [&str; 8] = [
        "1abc9c", "3498db", "9b59b6", "e67e22", "e74c3c", "2ecc71", "f39c12", "34495e",
    ];
    let hash: usize = symbol.bytes().map(|b| b as usize).sum();
    let color = PALETTE[hash % PALETTE.len()];
    let monogram: String = symbol.chars().take(2).collect();
    format!(
        "https://ui-avatars.com/api/?name={}&background={}&color=fff&size=128",
        monogram, color
    )
}

// ── Label/value collection ────────────────────────────────────────────────────

/// Collect (normalized label, raw value) pairs from every two-column table
/// row, definition-list pair, and labeled stat block, in that order. The
/// order fixes which source wins for a duplicated label.
fn label_value_pairs(doc: &Html) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for table in doc.select(&TABLE) {
        for tr in table.select(&TR) {
            let cells: Vec<String> = tr
                .select(&CELL)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            match cells.len() {
                2 => pairs.push((normalise_label(&cells[0]), cells[1].clone())),
                4 => {
                    pairs.push((normalise_label(&cells[0]), cells[1].clone()));
                    pairs.push((normalise_label(&cells[2]), cells[3].clone()));
                }
                _ => {}
            }
        }
    }

    let dts: Vec<String> = doc
        .select(&DT)
        .map(|el| el.text().collect::<String>())
        .collect();
    let dds: Vec<String> = doc
        .select(&DD)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();
    for (dt, dd) in dts.iter().zip(dds.iter()) {
        pairs.push((normalise_label(dt), dd.clone()));
    }

    for item in doc.select(&STAT_ITEM) {
        let label = item
            .select(&STAT_LABEL)
            .next()
            .map(|el| el.text().collect::<String>());
        let value = item
            .select(&STAT_VALUE)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());
        if let (Some(label), Some(value)) = (label, value) {
            pairs.push((normalise_label(&label), value));
        }
    }

    pairs
}

fn pair_lookup(doc: &Html, label_fragment: &str) -> Option<String> {
    label_value_pairs(doc)
        .into_iter()
        .find(|(label, value)| label.contains(label_fragment) && !value.is_empty())
        .map(|(_, value)| value)
}

fn select_text(doc: &Html, sel_str: &str) -> Option<String> {
    let sel = Selector::parse(sel_str).ok()?;
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .and_then(|t| non_empty(&t))
}

fn page_text(doc: &Html) -> String {
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}

// ── Fundamentals / ratios / equity label matching ─────────────────────────────

fn apply_fundamental(f: &mut FundamentalsData, label: &str, value: &str) {
    let v = || parse_number(value);
    let l = label;

    if l.contains("market cap") {
        set_if_absent(&mut f.market_cap, v());
    } else if l.contains("peg") {
        set_if_absent(&mut f.peg_ratio, v());
    } else if l.contains("p/e") || l.contains("pe ratio") || l.contains("pe ttm") {
        set_if_absent(&mut f.pe_ratio, v());
    } else if l.contains("p/b") || l.contains("pb ratio") || l.contains("price to book") {
        set_if_absent(&mut f.pb_ratio, v());
    } else if l.contains("p/s") || l.contains("ps ratio") || l.contains("price to sales") {
        set_if_absent(&mut f.ps_ratio, v());
    } else if l.contains("ev/ebitda") || l.contains("ev to ebitda") {
        set_if_absent(&mut f.ev_ebitda, v());
    } else if l.contains("eps") || l.contains("earnings per share") {
        set_if_absent(&mut f.eps, v());
    } else if l.contains("book value") {
        set_if_absent(&mut f.book_value, v());
    } else if l.contains("dividend yield") || l.contains("div yield") {
        set_if_absent(&mut f.dividend_yield, v());
    } else if l.contains("dividend per share") || l.contains("dps") || l.contains("dividend") {
        set_if_absent(&mut f.dividend_per_share, v());
    } else if l.contains("free float") && l.contains("share") {
        set_if_absent(&mut f.free_float_shares, v());
    } else if l.contains("shares outstanding") || l.contains("outstanding shares") {
        set_if_absent(&mut f.shares_outstanding, v());
    } else if l.contains("52") && l.contains("high") {
        set_if_absent(&mut f.week52_high, v());
    } else if l.contains("52") && l.contains("low") {
        set_if_absent(&mut f.week52_low, v());
    } else if l.contains("avg volume") || l.contains("average volume") {
        set_if_absent(&mut f.avg_volume, v());
    } else if l == "price" || l.contains("current price") || l.contains("last price") {
        set_if_absent(&mut f.current_price, v());
    } else if l == "change" || l.contains("price change") {
        set_if_absent(&mut f.price_change, v());
    }
}

fn apply_ratio(r: &mut RatiosData, label: &str, value: &str) {
    let v = || parse_number(value);
    let l = label;

    if l.contains("roce") || l.contains("return on capital") {
        set_if_absent(&mut r.roce, v());
    } else if l.contains("roe") || l.contains("return on equity") {
        set_if_absent(&mut r.roe, v());
    } else if l.contains("roa") || l.contains("return on assets") {
        set_if_absent(&mut r.roa, v());
    } else if l.contains("gross margin") || l.contains("gross profit margin") {
        set_if_absent(&mut r.gross_margin, v());
    } else if l.contains("operating margin") || l.contains("operating profit margin") {
        set_if_absent(&mut r.operating_margin, v());
    } else if l.contains("net margin") || l.contains("net profit margin") {
        set_if_absent(&mut r.net_margin, v());
    } else if l.contains("debt to equity") || l.contains("debt/equity") {
        set_if_absent(&mut r.debt_to_equity, v());
    } else if l.contains("debt ratio") {
        set_if_absent(&mut r.debt_ratio, v());
    } else if l.contains("current ratio") {
        set_if_absent(&mut r.current_ratio, v());
    } else if l.contains("quick ratio") {
        set_if_absent(&mut r.quick_ratio, v());
    } else if l.contains("revenue growth") || l.contains("sales growth") {
        set_if_absent(&mut r.revenue_growth, v());
    } else if l.contains("earnings growth") || l.contains("profit growth") {
        set_if_absent(&mut r.earnings_growth, v());
    }
}

fn apply_equity(e: &mut EquityData, label: &str, value: &str) {
    let v = || parse_number(value);
    let l = label;

    if l.contains("market cap") {
        set_if_absent(&mut e.market_cap, v());
    } else if l.contains("shares outstanding")
        || l.contains("outstanding shares")
        || l.contains("total shares")
    {
        set_if_absent(&mut e.shares_outstanding, v());
    } else if l.contains("free float") && l.contains('%') {
        set_if_absent(&mut e.free_float_pct, v());
    } else if l.contains("free float") {
        set_if_absent(&mut e.free_float_shares, v());
    }
}

// ── Regex text fallback ───────────────────────────────────────────────────────

static RE_PE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bP/?E(?:\s*ratio)?(?:\s*\(ttm\))?\s*[:\-]?\s*\(?(-?[0-9][0-9,]*\.?[0-9]*)\)?")
        .expect("pe regex")
});
static RE_EPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bEPS\s*[:\-]?\s*\(?(-?[0-9][0-9,]*\.?[0-9]*)\)?").expect("eps regex")
});
static RE_MARKET_CAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)market\s+cap(?:italization)?\s*[:\-]?\s*(?:Rs\.?|PKR)?\s*([0-9][0-9,]*\.?[0-9]*\s*(?:K|M|B|Bn|Mn|Cr|Crore|L|Lakh)?)")
        .expect("market cap regex")
});
static RE_DIV_YIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)dividend\s+yield\s*[:\-]?\s*([0-9][0-9,]*\.?[0-9]*)\s*%?").expect("yield regex")
});
static RE_BOOK_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)book\s+value\s*(?:per\s+share)?\s*[:\-]?\s*(?:Rs\.?|PKR)?\s*([0-9][0-9,]*\.?[0-9]*)")
        .expect("book value regex")
});
static RE_SHARES_OUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)shares\s+outstanding\s*[:\-]?\s*([0-9][0-9,]*\.?[0-9]*\s*(?:K|M|B|Bn|Mn|Cr|Crore|L|Lakh)?)")
        .expect("shares regex")
});

/// Fill fundamentals still unset from the raw page text, same
/// first-match-wins rule as the structured sources.
fn sweep_fundamentals(f: &mut FundamentalsData, text: &str) {
    sweep(&mut f.pe_ratio, &RE_PE, text);
    sweep(&mut f.eps, &RE_EPS, text);
    sweep(&mut f.market_cap, &RE_MARKET_CAP, text);
    sweep(&mut f.dividend_yield, &RE_DIV_YIELD, text);
    sweep(&mut f.book_value, &RE_BOOK_VALUE, text);
    sweep(&mut f.shares_outstanding, &RE_SHARES_OUT, text);
}

fn sweep(slot: &mut Option<f64>, re: &Regex, text: &str) {
    if slot.is_some() {
        return;
    }
    if let Some(caps) = re.captures(text) {
        set_if_absent(slot, caps.get(1).and_then(|m| parse_number(m.as_str())));
    }
}

// ── Financial statements ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PeriodKey {
    period_type: PeriodType,
    fiscal_year: i32,
    quarter: u8, // 0 = annual
}

/// Scan every table for a header row carrying fiscal-period columns; for
/// each detected column, accumulate matching body-row line items into one
/// `FinancialPeriod` per (year[, quarter]) key. A period record is only
/// created once a recognized line item references it, so year-headed
/// tables that carry no statement rows (dividend history, announcements)
/// contribute nothing.
fn parse_financials(doc: &Html) -> Vec<FinancialPeriod> {
    let mut periods: BTreeMap<PeriodKey, FinancialPeriod> = BTreeMap::new();

    for table in doc.select(&TABLE) {
        let rows: Vec<_> = table.select(&TR).collect();

        // The period header is not always the first row; caption rows like
        // a spanning "Income Statement" title may precede it.
        let mut columns: Vec<(usize, PeriodKey)> = Vec::new();
        let mut header_idx = None;
        for (ri, tr) in rows.iter().enumerate() {
            let cells: Vec<String> = tr
                .select(&CELL)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            let found: Vec<(usize, PeriodKey)> = cells
                .iter()
                .enumerate()
                .filter_map(|(idx, cell)| parse_period_header(cell).map(|key| (idx, key)))
                .collect();
            if !found.is_empty() {
                columns = found;
                header_idx = Some(ri);
                break;
            }
        }
        let Some(header_idx) = header_idx else { continue };

        for tr in &rows[header_idx + 1..] {
            let cells: Vec<String> = tr
                .select(&CELL)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            let Some(label) = cells.first() else { continue };
            let Some(item) = classify_statement_label(&normalise_label(label)) else {
                continue;
            };

            for &(idx, key) in &columns {
                let Some(raw) = cells.get(idx) else { continue };
                let value = parse_number(raw);
                let period = periods.entry(key).or_insert_with(|| {
                    FinancialPeriod::new(
                        key.period_type,
                        key.fiscal_year,
                        (key.quarter > 0).then_some(key.quarter),
                    )
                });
                apply_statement_item(period, item, value);
            }
        }
    }

    periods.into_values().collect()
}

/// "2024" → annual; "Q1 2024" / "2024 Q1" → quarterly.
fn parse_period_header(cell: &str) -> Option<PeriodKey> {
    let cell = cell.trim();
    if RE_YEAR.is_match(cell) {
        return Some(PeriodKey {
            period_type: PeriodType::Annual,
            fiscal_year: cell.parse().ok()?,
            quarter: 0,
        });
    }

    let caps = RE_QUARTER.captures(cell)?;
    let (quarter, year) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
        (Some(q), Some(y), _, _) => (q.as_str(), y.as_str()),
        (_, _, Some(y), Some(q)) => (q.as_str(), y.as_str()),
        _ => return None,
    };
    Some(PeriodKey {
        period_type: PeriodType::Quarterly,
        fiscal_year: year.parse().ok()?,
        quarter: quarter.parse().ok()?,
    })
}

#[derive(Debug, Clone, Copy)]
enum StatementItem {
    Revenue,
    CostOfRevenue,
    GrossProfit,
    OperatingIncome,
    NetIncome,
    Eps,
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    OperatingCashFlow,
    CapitalExpenditure,
    FreeCashFlow,
}

/// Map a normalized row label to a statement line item, or `None` for the
/// labels the dividend-history and announcement tables carry.
fn classify_statement_label(l: &str) -> Option<StatementItem> {
    if l.contains("cost of") {
        Some(StatementItem::CostOfRevenue)
    } else if l.contains("revenue") || l.contains("sales") || l.contains("turnover") {
        Some(StatementItem::Revenue)
    } else if l.contains("gross profit") {
        Some(StatementItem::GrossProfit)
    } else if l.contains("operating income")
        || l.contains("operating profit")
        || l.contains("ebit")
    {
        Some(StatementItem::OperatingIncome)
    } else if l.contains("net income")
        || l.contains("net profit")
        || l.contains("profit after tax")
    {
        Some(StatementItem::NetIncome)
    } else if l.contains("eps") || l.contains("earnings per share") {
        Some(StatementItem::Eps)
    } else if l.contains("total assets") {
        Some(StatementItem::TotalAssets)
    } else if l.contains("total liabilities") {
        Some(StatementItem::TotalLiabilities)
    } else if l.contains("total equity") || l.contains("shareholders equity") {
        Some(StatementItem::TotalEquity)
    } else if l.contains("operating cash") || l.contains("cash from operations") {
        Some(StatementItem::OperatingCashFlow)
    } else if l.contains("capital expenditure") || l.contains("capex") {
        Some(StatementItem::CapitalExpenditure)
    } else if l.contains("free cash flow") {
        Some(StatementItem::FreeCashFlow)
    } else {
        None
    }
}

/// Same metric may render under two labels on one page; first write wins.
fn apply_statement_item(p: &mut FinancialPeriod, item: StatementItem, value: Option<f64>) {
    let slot = match item {
        StatementItem::Revenue => &mut p.revenue,
        StatementItem::CostOfRevenue => &mut p.cost_of_revenue,
        StatementItem::GrossProfit => &mut p.gross_profit,
        StatementItem::OperatingIncome => &mut p.operating_income,
        StatementItem::NetIncome => &mut p.net_income,
        StatementItem::Eps => &mut p.eps,
        StatementItem::TotalAssets => &mut p.total_assets,
        StatementItem::TotalLiabilities => &mut p.total_liabilities,
        StatementItem::TotalEquity => &mut p.total_equity,
        StatementItem::OperatingCashFlow => &mut p.operating_cash_flow,
        StatementItem::CapitalExpenditure => &mut p.capital_expenditure,
        StatementItem::FreeCashFlow => &mut p.free_cash_flow,
    };
    set_if_absent(slot, value);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins_on_duplicate_labels() {
        // Same field twice under different labels: table pair is evaluated
        // before the stat block, so its value must be retained.
        let html = r#"<html><body>
            <table><tr><td>P/E Ratio</td><td>8.40</td></tr></table>
            <div class="stats_item">
              <div class="stats_label">PE Ratio (TTM)</div>
              <div class="stats_value">9.99</div>
            </div>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.fundamentals.pe_ratio, Some(8.40));
    }

    #[test]
    fn test_stat_blocks_and_dl_pairs_are_scanned() {
        let html = r#"<html><body>
            <dl><dt>Book Value</dt><dd>Rs. 45.20</dd></dl>
            <div class="stats_item">
              <div class="stats_label">Dividend Yield</div>
              <div class="stats_value">5.1%</div>
            </div>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.fundamentals.book_value, Some(45.20));
        assert_eq!(data.fundamentals.dividend_yield, Some(5.1));
    }

    #[test]
    fn test_regex_sweep_fills_unset_fields_only() {
        let html = r#"<html><body>
            <table><tr><td>EPS</td><td>12.00</td></tr></table>
            <p>Trading at a P/E ratio: 6.25 with EPS: 99.0 reported.</p>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        // Structured value kept, text sweep only fills what was unset
        assert_eq!(data.fundamentals.eps, Some(12.00));
        assert_eq!(data.fundamentals.pe_ratio, Some(6.25));
    }

    #[test]
    fn test_annual_and_quarterly_periods_stay_distinct() {
        let html = r#"<html><body>
            <table>
              <tr><th>Item</th><th>2024</th><th>Q1 2024</th></tr>
              <tr><td>Revenue</td><td>40,000</td><td>11,000</td></tr>
              <tr><td>Net Profit</td><td>5,000</td><td>1,250</td></tr>
            </table>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.financials.len(), 2);

        let annual = data
            .financials
            .iter()
            .find(|p| p.period_type == PeriodType::Annual)
            .unwrap();
        assert_eq!(annual.fiscal_year, 2024);
        assert_eq!(annual.quarter, None);
        assert_eq!(annual.revenue, Some(40_000.0));
        assert_eq!(annual.net_income, Some(5_000.0));

        let quarterly = data
            .financials
            .iter()
            .find(|p| p.period_type == PeriodType::Quarterly)
            .unwrap();
        assert_eq!(quarterly.fiscal_year, 2024);
        assert_eq!(quarterly.quarter, Some(1));
        assert_eq!(quarterly.revenue, Some(11_000.0));
    }

    #[test]
    fn test_statement_duplicate_label_first_write_wins() {
        let html = r#"<html><body>
            <table>
              <tr><th>Item</th><th>2023</th></tr>
              <tr><td>Net Profit</td><td>800</td></tr>
              <tr><td>Net Income</td><td>999</td></tr>
              <tr><td>Cost of Sales</td><td>(2,400)</td></tr>
            </table>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        let annual = &data.financials[0];
        assert_eq!(annual.net_income, Some(800.0));
        assert_eq!(annual.cost_of_revenue, Some(-2_400.0));
    }

    #[test]
    fn test_year_headed_dividend_table_yields_no_periods() {
        // Payout history uses year columns too; none of its rows are
        // statement line items, so no period record may appear.
        let html = r#"<html><body>
            <table>
              <tr><th>Payout</th><th>2022</th><th>2023</th><th>2024</th></tr>
              <tr><td>Cash Dividend</td><td>55%</td><td>60%</td><td>65%</td></tr>
              <tr><td>Bonus Issue</td><td>-</td><td>10%</td><td>-</td></tr>
            </table>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert!(data.financials.is_empty());
    }

    #[test]
    fn test_caption_row_above_period_header_is_skipped() {
        let html = r#"<html><body>
            <table>
              <tr><th colspan="3">Income Statement</th></tr>
              <tr><th>Item</th><th>2023</th><th>2024</th></tr>
              <tr><td>Revenue</td><td>38,000</td><td>40,000</td></tr>
            </table>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.financials.len(), 2);
        assert_eq!(data.financials[0].revenue, Some(38_000.0));
        assert_eq!(data.financials[1].revenue, Some(40_000.0));
    }

    #[test]
    fn test_equity_backfills_fundamentals() {
        let html = r#"<html><body>
            <div class="stats_item">
              <div class="stats_label">Shares Outstanding</div>
              <div class="stats_value">1.2B</div>
            </div>
            <div class="stats_item">
              <div class="stats_label">Free Float (%)</div>
              <div class="stats_value">35</div>
            </div>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.equity.shares_outstanding, Some(1_200_000_000.0));
        assert_eq!(data.equity.free_float_pct, Some(35.0));
        assert_eq!(data.fundamentals.shares_outstanding, Some(1_200_000_000.0));
    }

    #[test]
    fn test_identity_and_logo_from_page() {
        let html = r#"<html><body>
            <h1 class="quote__name">ABC Industries Limited</h1>
            <div class="quote__sector">Cement</div>
            <div class="company__header"><img src="/img/abc.png"></div>
            <p class="company__description">Manufactures cement.</p>
        </body></html>"#;

        let data = parse_company_page(html, "ABC");
        assert_eq!(data.info.name.as_deref(), Some("ABC Industries Limited"));
        assert_eq!(data.info.sector.as_deref(), Some("Cement"));
        assert_eq!(data.info.logo_url.as_deref(), Some("/img/abc.png"));
        assert_eq!(data.info.description.as_deref(), Some("Manufactures cement."));
    }

    #[test]
    fn test_placeholder_logo_is_stable() {
        let a = placeholder_logo("HUBC");
        let b = placeholder_logo("HUBC");
        assert_eq!(a, b);
        assert!(a.contains("ui-avatars.com"));
        assert!(a.contains("name=HU"));
    }

    #[test]
    fn test_bare_page_still_gets_a_logo() {
        let data = parse_company_page("<html><body></body></html>", "ENGRO");
        let logo = data.info.logo_url.unwrap();
        assert!(logo.contains("ui-avatars.com"));
    }

    #[test]
    fn test_period_header_forms() {
        assert_eq!(
            parse_period_header("2024"),
            Some(PeriodKey {
                period_type: PeriodType::Annual,
                fiscal_year: 2024,
                quarter: 0
            })
        );
        assert_eq!(
            parse_period_header("Q3 2023"),
            Some(PeriodKey {
                period_type: PeriodType::Quarterly,
                fiscal_year: 2023,
                quarter: 3
            })
        );
        assert_eq!(
            parse_period_header("2023 Q3"),
            Some(PeriodKey {
                period_type: PeriodType::Quarterly,
                fiscal_year: 2023,
                quarter: 3
            })
        );
        assert_eq!(parse_period_header("Item"), None);
        assert_eq!(parse_period_header("FY Notes"), None);
    }
}
