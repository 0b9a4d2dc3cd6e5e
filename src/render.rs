//! Server-rendered HTML for the alpha feed, token grid and token detail views.

use chrono::{DateTime, NaiveDate, Utc};

use crate::assembler::{MarketCapCeiling, TokenFilters, ALL_SORT_ORDERS};
use crate::format::{
    adjust_date, escape_html, format_count, format_date_label, format_market_cap_compact,
    format_usd, truncate_address,
};
use crate::grouping::DateGroup;
use crate::opportunity::{score_label, Opportunity, Recommendation};
use crate::submission::{AnalysisAvailability, ScoutResult};
use crate::timestamp::normalize_timestamp;
use crate::token::{Chain, SocialPost, Token, ALL_CHAINS};

pub const PAST_ANALYSIS_PAGE_SIZE: usize = 10;
pub const GATE_REFRESH_SECONDS: u32 = 60;

const MARKET_CAP_PRESETS: [(&str, &str); 5] = [
    ("all", "All market caps"),
    ("1000000", "Under $1M"),
    ("10000000", "Under $10M"),
    ("100000000", "Under $100M"),
    ("1000000000", "Under $1B"),
];

const STYLE: &str = ":root{--bg:#f5f1e7;--bg2:#e9f0f2;--card:#ffffff;--ink:#182026;--muted:#5f6a73;--line:#d7dce1;--head:#14343f;--btn:#0c5f78;--buy:#1f7a3d;--sell:#a3262a;--hold:#8c6a00}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Space Grotesk\",\"Avenir Next\",\"Segoe UI\",sans-serif;background:linear-gradient(160deg,var(--bg),var(--bg2));min-height:100vh}.shell{max-width:1200px;margin:0 auto;padding:24px 18px 28px}.hero{background:linear-gradient(135deg,#102f3a 0%,#24576b 100%);color:#f7fbfc;border-radius:16px;padding:18px 20px}.hero h1{margin:0 0 8px;font-size:1.6rem}.hero nav a{color:#dcebf0;margin-right:14px}.date-nav{display:flex;gap:14px;align-items:center;margin-top:16px}.date-nav .disabled{color:var(--muted)}.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(280px,1fr));gap:14px;margin-top:16px}.card{background:var(--card);border:1px solid #cbd4db;border-radius:14px;padding:14px 16px;margin-top:14px;box-shadow:0 8px 20px rgba(26,35,42,.10)}.card h3{margin:4px 0}.card dl{display:grid;grid-template-columns:auto 1fr;gap:4px 12px;font-size:.86rem}.card dt{color:var(--muted)}.badge{display:inline-block;padding:2px 8px;border-radius:8px;color:#fff;font-size:.72rem;font-weight:700;text-transform:uppercase}.recommendation-buy{background:var(--buy)}.recommendation-sell{background:var(--sell)}.recommendation-hold{background:var(--hold)}.mono{font-family:\"IBM Plex Mono\",\"SFMono-Regular\",monospace}.muted{color:var(--muted)}.error{background:#fdecea;border:1px solid #f5c2c0;border-radius:12px;padding:12px 14px;margin-top:16px}.btn{display:inline-block;background:var(--btn);color:#fff;text-decoration:none;border:0;border-radius:9px;padding:7px 12px;font-weight:700;cursor:pointer}.token-icon{width:40px;height:40px;border-radius:50%;object-fit:cover;background:var(--line)}.filters{display:flex;flex-wrap:wrap;gap:10px;align-items:center;margin-top:16px}.chip{border:1px solid var(--line);border-radius:14px;padding:3px 10px;text-decoration:none;color:var(--ink)}.chip.active{background:var(--head);color:#fff}.pager{display:flex;gap:12px;margin-top:12px}";

/// Wraps a body in the shared page chrome.
fn page(title: &str, head_extra: &str, body: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(head_extra);
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    out.push_str("<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n</head><body><main class=\"shell\">\n");
    out.push_str("<section class=\"hero\"><h1>Alpha Feed</h1><nav>");
    out.push_str("<a href=\"/\">Alpha</a><a href=\"/tokens\">Tokens</a><a href=\"/reports\">Submit Report</a>");
    out.push_str("</nav></section>\n");
    out.push_str(body);
    out.push_str("</main></body></html>\n");
    out
}

pub fn error_block(message: &str, retry_href: Option<&str>) -> String {
    let mut out = String::from("<section class=\"error\" role=\"alert\"><p>");
    out.push_str(&escape_html(message));
    out.push_str("</p>");
    if let Some(href) = retry_href {
        out.push_str(&format!(
            "<a class=\"btn\" href=\"{}\">Try Again</a>",
            escape_html(href)
        ));
    }
    out.push_str("</section>\n");
    out
}

pub fn alpha_href(date: Option<NaiveDate>) -> String {
    match date {
        Some(day) => format!("/?date={}", day.format("%Y-%m-%d")),
        None => "/".to_string(),
    }
}

/// The alpha feed for one selected day. `requested` is the `date` query
/// parameter; `None` means today.
pub fn render_alpha_page(
    requested: Option<NaiveDate>,
    today: NaiveDate,
    feed: Result<&[DateGroup], String>,
) -> String {
    let selected = requested.unwrap_or(today);
    let mut body = String::new();

    body.push_str("<nav class=\"date-nav\">");
    body.push_str(&format!(
        "<a class=\"chip\" href=\"{}\">&larr; Previous</a>",
        escape_html(&alpha_href(Some(adjust_date(selected, -1))))
    ));
    body.push_str(&format!(
        "<strong id=\"selected-date\">{}</strong>",
        escape_html(&format_date_label(selected, today))
    ));
    if selected < today {
        body.push_str(&format!(
            "<a class=\"chip\" href=\"{}\">Next &rarr;</a>",
            escape_html(&alpha_href(Some(adjust_date(selected, 1))))
        ));
    } else {
        body.push_str("<span class=\"chip disabled\">Next &rarr;</span>");
    }
    body.push_str("</nav>\n");

    match feed {
        Err(message) => body.push_str(&error_block(&message, Some(&alpha_href(requested)))),
        Ok(groups) if groups.iter().all(|g| g.opportunities.is_empty()) => {
            body.push_str("<p class=\"muted\">No alpha reports for this date.</p>\n");
        }
        Ok(groups) => {
            for group in groups {
                body.push_str(&format!(
                    "<section class=\"date-group\" data-date=\"{}\"><h2>{}</h2>\n",
                    group.date.format("%Y-%m-%d"),
                    escape_html(&format_date_label(group.date, today))
                ));
                for opp in &group.opportunities {
                    body.push_str(&opportunity_card(opp));
                }
                body.push_str("</section>\n");
            }
        }
    }

    page("Alpha Feed", "", &body)
}

pub fn opportunity_card(opp: &Opportunity) -> String {
    let when = opp
        .timestamp()
        .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| opp.created_at.clone());

    card(CardFields {
        name: &opp.name,
        recommendation: opp.recommendation,
        when: Some(&when),
        chain: &opp.chain,
        contract_address: opp.contract_address.as_deref(),
        market_cap: opp.market_cap,
        community_score: opp.community_score,
        safety_score: opp.safety_score,
        justification: &opp.justification,
        sources: &opp.sources,
    })
}

pub fn scout_result_card(result: &ScoutResult) -> String {
    card(CardFields {
        name: &result.name,
        recommendation: result.recommendation,
        when: None,
        chain: &result.chain,
        contract_address: result.contract_address.as_deref(),
        market_cap: result.market_cap,
        community_score: result.community_score,
        safety_score: result.safety_score,
        justification: &result.justification,
        sources: &result.sources,
    })
}

struct CardFields<'a> {
    name: &'a str,
    recommendation: Recommendation,
    when: Option<&'a str>,
    chain: &'a str,
    contract_address: Option<&'a str>,
    market_cap: Option<f64>,
    community_score: Option<f64>,
    safety_score: Option<f64>,
    justification: &'a str,
    sources: &'a [String],
}

fn card(fields: CardFields<'_>) -> String {
    let mut out = String::from("<article class=\"card opportunity\">");
    out.push_str(&format!(
        "<span class=\"badge {}\">{}</span>",
        fields.recommendation.css_class(),
        fields.recommendation.as_str().to_ascii_uppercase()
    ));
    out.push_str(&format!("<h3>{}</h3>", escape_html(fields.name)));
    if let Some(when) = fields.when {
        out.push_str(&format!("<time class=\"muted\">{}</time>", escape_html(when)));
    }

    out.push_str("<dl>");
    push_row(&mut out, "Chain", fields.chain);
    if let Some(contract) = fields.contract_address {
        out.push_str(&format!(
            "<dt>Contract</dt><dd class=\"mono\">{}</dd>",
            escape_html(contract)
        ));
    }
    if let Some(cap) = fields.market_cap.filter(|cap| *cap != 0.0) {
        push_row(&mut out, "Market Cap", &format_usd(cap));
    }
    push_row(&mut out, "Community Score", &score_label(fields.community_score));
    push_row(&mut out, "Safety Score", &score_label(fields.safety_score));
    out.push_str("</dl>");

    out.push_str(&format!(
        "<p class=\"justification\">{}</p>",
        escape_html(fields.justification)
    ));
    if !fields.sources.is_empty() {
        out.push_str("<ul class=\"sources\">");
        for source in fields.sources {
            out.push_str(&format!(
                "<li><a href=\"{0}\" target=\"_blank\" rel=\"noopener noreferrer\">{0}</a></li>",
                escape_html(source)
            ));
        }
        out.push_str("</ul>");
    }
    out.push_str("</article>\n");
    out
}

fn push_row(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!(
        "<dt>{}</dt><dd>{}</dd>",
        escape_html(label),
        escape_html(value)
    ));
}

/// Where the "load more" link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    Cursor(String),
    Page(usize),
}

pub fn tokens_href(filters: &TokenFilters, resume: Option<&ResumePoint>) -> String {
    let mut href = format!(
        "/tokens?chains={}&market_cap={}&sort={}",
        urlencoding::encode(&filters.chains_param()),
        urlencoding::encode(&filters.market_cap.to_string()),
        filters.sort.as_str()
    );
    match resume {
        Some(ResumePoint::Cursor(cursor)) => {
            href.push_str(&format!("&cursor={}", urlencoding::encode(cursor)))
        }
        Some(ResumePoint::Page(page)) => href.push_str(&format!("&page={page}")),
        None => {}
    }
    href
}

pub fn token_href(address: &str) -> String {
    format!("/token?address={}", urlencoding::encode(address))
}

pub fn render_token_grid(
    filters: &TokenFilters,
    tokens: Result<&[Token], String>,
    load_more: Option<&ResumePoint>,
) -> String {
    let mut body = filter_bar(filters);

    match tokens {
        Err(message) => body.push_str(&error_block(&message, Some(&tokens_href(filters, None)))),
        Ok([]) => body.push_str("<p class=\"muted\">No tokens found.</p>\n"),
        Ok(tokens) => {
            body.push_str("<section class=\"grid\" id=\"token-grid\">\n");
            for token in tokens {
                body.push_str(&token_card(token));
            }
            body.push_str("</section>\n");
            if let Some(resume) = load_more {
                body.push_str(&format!(
                    "<p><a class=\"btn\" id=\"load-more\" href=\"{}\">Load more</a></p>\n",
                    escape_html(&tokens_href(filters, Some(resume)))
                ));
            }
        }
    }

    page("Tokens", "", &body)
}

fn filter_bar(filters: &TokenFilters) -> String {
    let mut out = String::from("<section class=\"filters\">");
    for chain in ALL_CHAINS {
        let mut toggled = filters.clone();
        let active = !toggled.chains.insert(chain);
        if active {
            toggled.chains.remove(&chain);
        }
        out.push_str(&format!(
            "<a class=\"chip{}\" href=\"{}\">{}</a>",
            if active { " active" } else { "" },
            escape_html(&tokens_href(&toggled, None)),
            chain_label(chain)
        ));
    }

    out.push_str("<form method=\"get\" action=\"/tokens\">");
    out.push_str(&format!(
        "<input type=\"hidden\" name=\"chains\" value=\"{}\">",
        escape_html(&filters.chains_param())
    ));
    out.push_str("<select name=\"market_cap\">");
    let current_cap = filters.market_cap.to_string();
    for (value, label) in MARKET_CAP_PRESETS {
        let selected = MarketCapCeiling::parse(value)
            .map(|preset| preset.to_string() == current_cap)
            .unwrap_or(false);
        out.push_str(&format!(
            "<option value=\"{value}\"{}>{label}</option>",
            if selected { " selected" } else { "" }
        ));
    }
    out.push_str("</select><select name=\"sort\">");
    for order in ALL_SORT_ORDERS {
        out.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            order.as_str(),
            if order == filters.sort { " selected" } else { "" },
            escape_html(order.label())
        ));
    }
    out.push_str("</select><button class=\"btn\" type=\"submit\">Apply</button></form>");
    out.push_str("</section>\n");
    out
}

fn chain_label(chain: Chain) -> &'static str {
    match chain {
        Chain::Base => "Base",
        Chain::Solana => "Solana",
    }
}

fn short_date(raw: Option<DateTime<Utc>>) -> String {
    raw.map(|ts| ts.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn token_card(token: &Token) -> String {
    let mut out = format!(
        "<article class=\"card token\" data-address=\"{}\">",
        escape_html(&token.address)
    );
    match token.image_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => out.push_str(&format!(
            "<img class=\"token-icon\" src=\"{}\" alt=\"{}\">",
            escape_html(url),
            escape_html(&token.symbol)
        )),
        None => out.push_str("<div class=\"token-icon placeholder\"></div>"),
    }
    out.push_str(&format!(
        "<h3><a href=\"{}\">{}</a></h3>",
        escape_html(&token_href(&token.address)),
        escape_html(&token.symbol)
    ));
    out.push_str(&format!(
        "<span class=\"mono muted\" title=\"{}\">{}</span>",
        escape_html(&token.address),
        escape_html(&truncate_address(&token.address))
    ));

    out.push_str("<dl>");
    push_row(&mut out, "Chain", chain_label(token.chain));
    push_row(
        &mut out,
        "Created",
        &short_date(token.created_at.as_deref().and_then(normalize_timestamp)),
    );
    push_row(
        &mut out,
        "Last Update",
        &short_date(token.latest_opportunity().and_then(Opportunity::timestamp)),
    );
    push_row(
        &mut out,
        "Market Cap",
        &token
            .latest_market_cap()
            .map(format_market_cap_compact)
            .unwrap_or_else(|| "N/A".to_string()),
    );
    push_row(&mut out, "KOL Events", &format_count(token.engagement_score()));
    out.push_str("</dl></article>\n");
    out
}

/// Everything the detail page needs besides the token itself.
#[derive(Debug, Clone)]
pub struct TokenDetailView<'a> {
    pub token: &'a Token,
    pub availability: AnalysisAvailability,
    pub past_page: usize,
    pub notice: Option<String>,
}

pub fn render_token_detail(view: &TokenDetailView<'_>) -> String {
    let token = view.token;
    let mut body = String::new();

    body.push_str("<section class=\"card token-header\">");
    body.push_str(&format!(
        "<h2>{} <span class=\"muted\">{}</span></h2>",
        escape_html(token.display_name()),
        escape_html(&token.symbol)
    ));
    body.push_str("<dl>");
    push_row(&mut body, "Chain", chain_label(token.chain));
    body.push_str(&format!(
        "<dt>Address</dt><dd class=\"mono\" title=\"{0}\">{1}</dd>",
        escape_html(&token.address),
        escape_html(&truncate_address(&token.address))
    ));
    body.push_str("</dl>");
    body.push_str(&token_links(token));
    body.push_str("</section>\n");

    if let Some(notice) = &view.notice {
        body.push_str(&error_block(notice, None));
    }

    body.push_str("<section class=\"card analysis\"><h2>Analysis</h2>");
    match view.availability {
        AnalysisAvailability::Ready => body.push_str(&format!(
            "<form method=\"post\" action=\"/token/analyze?address={}\"><button class=\"btn\" type=\"submit\">Run Analysis</button></form>",
            urlencoding::encode(&token.address)
        )),
        gated => body.push_str(&format!(
            "<p class=\"muted\" id=\"analysis-gate\">{}</p>",
            escape_html(&gated.message())
        )),
    }
    body.push_str("</section>\n");

    let opportunities = token.opportunities_newest_first();
    match opportunities.split_first() {
        None => body.push_str("<p class=\"muted\">No analysis yet.</p>\n"),
        Some((latest, past)) => {
            body.push_str("<section><h2>Latest Analysis</h2>");
            body.push_str(&opportunity_card(latest));
            body.push_str("</section>\n");
            if !past.is_empty() {
                body.push_str(&past_analysis(token, past, view.past_page));
            }
        }
    }

    body.push_str(&social_posts(token));

    let head_extra = if view.availability.is_ready() {
        String::new()
    } else {
        format!("<meta http-equiv=\"refresh\" content=\"{GATE_REFRESH_SECONDS}\">\n")
    };
    page(token.display_name(), &head_extra, &body)
}

fn token_links(token: &Token) -> String {
    let mut links: Vec<(&str, String)> = [
        ("Website", &token.website_url),
        ("Warpcast", &token.warpcast_url),
        ("Twitter", &token.twitter_url),
        ("Telegram", &token.telegram_url),
        ("Signal", &token.signal_url),
    ]
    .into_iter()
    .filter_map(|(label, url)| {
        url.as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| (label, url.to_string()))
    })
    .collect();
    if token.chain == Chain::Base {
        links.push((
            "DEX Screener",
            format!("https://dexscreener.com/base/{}", token.address),
        ));
    }

    if links.is_empty() {
        return String::new();
    }
    let mut out = String::from("<p class=\"links\">");
    for (label, url) in links {
        out.push_str(&format!(
            "<a class=\"chip\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a> ",
            escape_html(&url),
            label
        ));
    }
    out.push_str("</p>");
    out
}

fn past_analysis(token: &Token, past: &[&Opportunity], requested_page: usize) -> String {
    let pages = past.len().div_ceil(PAST_ANALYSIS_PAGE_SIZE);
    let current = requested_page.clamp(1, pages);
    let start = (current - 1) * PAST_ANALYSIS_PAGE_SIZE;
    let end = (start + PAST_ANALYSIS_PAGE_SIZE).min(past.len());

    let mut out = String::from("<section class=\"past-analysis\"><h2>Past Analysis</h2>\n");
    for opp in &past[start..end] {
        out.push_str(&opportunity_card(opp));
    }
    if pages > 1 {
        let base = token_href(&token.address);
        out.push_str("<nav class=\"pager\">");
        if current > 1 {
            out.push_str(&format!(
                "<a href=\"{}&amp;past_page={}\">Previous</a>",
                escape_html(&base),
                current - 1
            ));
        }
        out.push_str(&format!("<span>Page {current} of {pages}</span>"));
        if current < pages {
            out.push_str(&format!(
                "<a href=\"{}&amp;past_page={}\">Next</a>",
                escape_html(&base),
                current + 1
            ));
        }
        out.push_str("</nav>");
    }
    out.push_str("</section>\n");
    out
}

fn social_posts(token: &Token) -> String {
    let mut seen = std::collections::HashSet::new();
    let posts: Vec<&SocialPost> = token
        .social_posts()
        .filter(|post| seen.insert(post.post_id.as_deref()))
        .collect();
    if posts.is_empty() {
        return String::new();
    }

    let mut out = String::from("<section class=\"social-posts\"><h2>Social Posts</h2>\n");
    for post in posts {
        let author = post
            .author_display_name
            .as_deref()
            .or(post.author_username.as_deref())
            .unwrap_or("Unknown");
        out.push_str("<article class=\"card post\">");
        out.push_str(&format!(
            "<p><strong>{}</strong>{} <span class=\"muted\">{}</span></p>",
            escape_html(author),
            post.author_username
                .as_deref()
                .map(|user| format!(" <span class=\"muted\">@{}</span>", escape_html(user)))
                .unwrap_or_default(),
            escape_html(&short_date(post.posted_at()))
        ));
        if let Some(text) = &post.text {
            out.push_str(&format!("<p>{}</p>", escape_html(text)));
        }
        out.push_str(&format!(
            "<p class=\"muted\">{} reactions · {} replies · {} reposts</p>",
            format_count(post.reactions_count.unwrap_or(0)),
            format_count(post.replies_count.unwrap_or(0)),
            format_count(post.reposts_count.unwrap_or(0))
        ));
        out.push_str("</article>\n");
    }
    out.push_str("</section>\n");
    out
}

pub fn render_token_error(message: &str, retry_href: Option<&str>) -> String {
    page("Token", "", &error_block(message, retry_href))
}

/// The report form, with the outcome of the last submission when there is one.
pub fn render_report_page(outcome: Option<Result<&ScoutResult, String>>) -> String {
    let mut body = String::from("<section class=\"card\"><h2>Submit Token Report</h2>");
    body.push_str("<form method=\"post\" action=\"/reports\">");
    body.push_str("<label><input type=\"checkbox\" name=\"mentions_purchasable_token\"> Mentions purchasable token</label><br>");
    for (name, label) in [
        ("token_symbol", "Token symbol"),
        ("token_chain", "Chain"),
        ("token_address", "Token address"),
        ("trading_pairs", "Trading pairs (comma separated)"),
    ] {
        body.push_str(&format!(
            "<label>{label} <input type=\"text\" name=\"{name}\"></label><br>"
        ));
    }
    body.push_str("<label><input type=\"checkbox\" name=\"is_listed_on_dex\"> Listed on DEX</label><br>");
    body.push_str("<label>Confidence (1-10) <input type=\"number\" name=\"confidence_score\" min=\"1\" max=\"10\"></label><br>");
    body.push_str("<label>Reasoning <textarea name=\"reasoning\"></textarea></label><br>");
    body.push_str("<button class=\"btn\" type=\"submit\">Analyze</button></form></section>\n");

    match outcome {
        Some(Ok(result)) => body.push_str(&scout_result_card(result)),
        Some(Err(message)) => body.push_str(&error_block(&message, None)),
        None => {}
    }

    page("Submit Report", "", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::SortOrder;
    use crate::token::fixtures::{opportunity, post, report, token};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn alpha_page_shows_empty_message_and_navigation() {
        let today = day(2024, 3, 15);
        let html = render_alpha_page(Some(day(2024, 3, 14)), today, Ok(&[]));
        assert!(html.contains("No alpha reports for this date."));
        assert!(html.contains("Yesterday"));
        assert!(html.contains("/?date=2024-03-13"));
        assert!(html.contains("/?date=2024-03-15"));
    }

    #[test]
    fn alpha_page_error_has_retry_link() {
        let today = day(2024, 3, 15);
        let html = render_alpha_page(None, today, Err("HTTP error! status: 500. x".to_string()));
        assert!(html.contains("Try Again"));
        assert!(html.contains("href=\"/\""));
        assert!(html.contains("Next &rarr;</span>"));
    }

    #[test]
    fn opportunity_card_formats_fields() {
        let mut opp = opportunity("FOO", "2024-03-15T10:00:00", Some(1_234_567.0));
        opp.recommendation = Recommendation::Buy;
        opp.sources = vec!["https://x.com/<script>".to_string()];

        let html = opportunity_card(&opp);
        assert!(html.contains("recommendation-buy"));
        assert!(html.contains("$1,234,567"));
        assert!(html.contains("Community Score</dt><dd>N/A"));
        assert!(html.contains("https://x.com/&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn zero_market_cap_is_hidden() {
        let opp = opportunity("FOO", "2024-03-15T10:00:00", Some(0.0));
        assert!(!opportunity_card(&opp).contains("Market Cap"));
    }

    #[test]
    fn token_card_shows_compact_cap_and_kol_events() {
        let mut t = token("0x1234567890abcdef", Chain::Base);
        t.symbol = "FOO".to_string();
        t.token_opportunities
            .push(opportunity("FOO", "2024-03-15T10:00:00", Some(4_560_000.0)));
        t.token_reports
            .push(report("2024-03-15T09:00:00", Some(post("p1", 1_200, "2024-03-15T08:00:00"))));

        let html = token_card(&t);
        assert!(html.contains("0x12...cdef"));
        assert!(html.contains("$4.56M"));
        assert!(html.contains("1,201"));
        assert!(html.contains("/token?address=0x1234567890abcdef"));
    }

    #[test]
    fn grid_load_more_link_carries_filters_and_resume_point() {
        let filters = TokenFilters {
            sort: SortOrder::KolEvents,
            ..TokenFilters::default()
        };
        let tokens = vec![token("0xabc", Chain::Solana)];
        let html = render_token_grid(
            &filters,
            Ok(&tokens),
            Some(&ResumePoint::Cursor("next page".to_string())),
        );
        assert!(html.contains("id=\"load-more\""));
        assert!(html.contains("sort=kol_events&amp;cursor=next%20page"));

        let empty = render_token_grid(&filters, Ok(&[]), None);
        assert!(empty.contains("No tokens found."));
    }

    #[test]
    fn links_percent_encode_addresses_and_filters() {
        assert_eq!(token_href("a/b c,d"), "/token?address=a%2Fb%20c%2Cd");
        assert_eq!(token_href("0xAbC-_.~"), "/token?address=0xAbC-_.~");

        let filters = TokenFilters {
            market_cap: MarketCapCeiling::Max(1_000_000.0),
            ..TokenFilters::default()
        };
        let href = tokens_href(&filters, Some(&ResumePoint::Page(2)));
        assert!(href.contains("chains=base%2Csolana"));
        assert!(href.ends_with("market_cap=1000000&sort=recent_opportunity&page=2"));
    }

    #[test]
    fn gated_detail_page_refreshes_every_minute() {
        let mut t = token("0xabc", Chain::Base);
        t.token_opportunities
            .push(opportunity("FOO", "2024-03-15T10:00:00", None));
        let view = TokenDetailView {
            token: &t,
            availability: AnalysisAvailability::CoolingDown { minutes_left: 12 },
            past_page: 1,
            notice: None,
        };

        let html = render_token_detail(&view);
        assert!(html.contains("http-equiv=\"refresh\" content=\"60\""));
        assert!(html.contains("Available in 12 minutes"));
        assert!(html.contains("https://dexscreener.com/base/0xabc"));
        assert!(!html.contains("Run Analysis"));
    }

    #[test]
    fn past_analysis_is_paginated() {
        let mut t = token("0xabc", Chain::Solana);
        for hour in 0..15 {
            t.token_opportunities.push(opportunity(
                "FOO",
                &format!("2024-03-15T{hour:02}:00:00"),
                None,
            ));
        }
        let view = TokenDetailView {
            token: &t,
            availability: AnalysisAvailability::Ready,
            past_page: 2,
            notice: None,
        };

        let html = render_token_detail(&view);
        assert!(html.contains("Past Analysis"));
        assert!(html.contains("Page 2 of 2"));
        assert!(html.contains("Run Analysis"));
        assert!(!html.contains("dexscreener"));
        // 1 latest card plus 4 past cards on the second page.
        assert_eq!(html.matches("class=\"card opportunity\"").count(), 5);
    }
}
