use {
    scraper::{ElementRef, Html, Selector},
    serde::Serialize,
    tracing::debug,
};

use crate::{
    record::{ProductRecord, dedup_by_url},
    rules::ParseRules,
};

/// How far up from a product link the link strategy looks for its card.
const MAX_CARD_DEPTH: usize = 6;

/// Which extraction strategy produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Primary,
    Links,
    Pattern,
    /// No strategy found anything.
    #[serde(rename = "none")]
    Unmatched,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Links => "links",
            Self::Pattern => "pattern",
            Self::Unmatched => "none",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub records: Vec<ProductRecord>,
    pub strategy: Strategy,
    /// Product tiles matched by the first container selector that matched
    /// anything, whether or not they produced a record.
    pub containers_found: usize,
}

/// Extract product records from a page snapshot.
pub fn parse(html: &str, rules: &ParseRules) -> Vec<ProductRecord> {
    parse_detailed(html, rules).records
}

/// Like [`parse`], also reporting which strategy matched.
pub fn parse_detailed(html: &str, rules: &ParseRules) -> ParseOutcome {
    let doc = Html::parse_document(html);

    let (containers_found, records) = by_containers(&doc, rules);
    let (strategy, records) = if !records.is_empty() {
        (Strategy::Primary, records)
    } else {
        let records = dedup_by_url(by_links(&doc, rules));
        if !records.is_empty() {
            (Strategy::Links, records)
        } else {
            let records = dedup_by_url(by_pattern(html, rules));
            if records.is_empty() {
                (Strategy::Unmatched, records)
            } else {
                (Strategy::Pattern, records)
            }
        }
    };

    debug!(
        strategy = %strategy,
        containers_found,
        records = records.len(),
        bytes = html.len(),
        "parsed snapshot"
    );

    ParseOutcome {
        records,
        strategy,
        containers_found,
    }
}

fn by_containers(doc: &Html, rules: &ParseRules) -> (usize, Vec<ProductRecord>) {
    let Some(tiles) = rules
        .containers
        .iter()
        .map(|s| doc.select(s).collect::<Vec<_>>())
        .find(|tiles| !tiles.is_empty())
    else {
        return (0, Vec::new());
    };

    let found = tiles.len();
    let records = tiles
        .into_iter()
        .filter_map(|tile| from_tile(tile, rules))
        .collect();
    (found, dedup_by_url(records))
}

fn from_tile(tile: ElementRef<'_>, rules: &ParseRules) -> Option<ProductRecord> {
    let (link, href) = rules.links.iter().find_map(|s| {
        tile.select(s)
            .find_map(|a| a.value().attr("href").map(|h| (a, h)))
            .filter(|(_, h)| !h.trim().is_empty())
    })?;
    let url = rules.resolve(href);

    let name = first_text(tile, &rules.names)
        .or_else(|| keyword_text(tile, rules))
        .or_else(|| Some(text_of(link)).filter(|t| !t.is_empty()))?;

    let price = first_text(tile, &rules.prices).or_else(|| price_in(tile, rules));
    let sku = first_attr_or_text(tile, &rules.skus, "data-sku").or_else(|| rules.sku_from_url(&url));

    Some(ProductRecord {
        name,
        color: colors(tile, rules),
        price,
        sku,
        url,
    })
}

fn by_links(doc: &Html, rules: &ParseRules) -> Vec<ProductRecord> {
    let mut records = Vec::new();
    for link in doc.select(&rules.any_link) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = rules.resolve(href);
        if !rules.is_product_url(&url) {
            continue;
        }

        let card = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(MAX_CARD_DEPTH)
            .find(|a| contains_any(*a, &rules.names) || contains_any(*a, &rules.prices))
            .or_else(|| link.parent().and_then(ElementRef::wrap));

        let name = card
            .and_then(|c| first_text(c, &rules.names).or_else(|| keyword_text(c, rules)))
            .or_else(|| Some(text_of(link)).filter(|t| !t.is_empty()));
        let Some(name) = name else {
            continue;
        };

        records.push(ProductRecord {
            name,
            price: card.and_then(|c| first_text(c, &rules.prices).or_else(|| price_in(c, rules))),
            color: card.and_then(|c| colors(c, rules)),
            sku: rules.sku_from_url(&url),
            url,
        });
    }
    records
}

/// Regex pass over the raw markup for pages where nothing is in the DOM
/// proper, e.g. tiles embedded in a script payload.
fn by_pattern(html: &str, rules: &ParseRules) -> Vec<ProductRecord> {
    let hits: Vec<(usize, usize, &str)> = rules
        .href
        .captures_iter(html)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let href = c.get(1)?;
            Some((whole.start(), whole.end(), href.as_str()))
        })
        .filter(|(_, _, href)| rules.is_product_url(href))
        .collect();

    let mut records = Vec::new();
    for (i, (_, end, href)) in hits.iter().enumerate().take(rules.max_pattern_matches) {
        let stop = hits.get(i + 1).map_or(html.len(), |next| next.0);
        let window = html.get(*end..stop).unwrap_or_default();

        let name = rules
            .text_node
            .captures_iter(window)
            .filter_map(|c| c.get(1))
            .map(|m| normalize(&decode_entities(m.as_str())))
            .find(|t| rules.has_keyword(t));
        let Some(name) = name else {
            continue;
        };

        let url = rules.resolve(&decode_href(href));
        records.push(ProductRecord {
            name,
            price: rules.price.find(window).map(|m| m.as_str().to_string()),
            color: None,
            sku: rules.sku_from_url(&url),
            url,
        });
    }
    records
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize(&el.text().collect::<Vec<_>>().join(" "))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_any(el: ElementRef<'_>, selectors: &[Selector]) -> bool {
    selectors.iter().any(|s| el.select(s).next().is_some())
}

fn first_text(el: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|s| el.select(s).map(text_of).find(|t| !t.is_empty()))
}

fn first_attr_or_text(el: ElementRef<'_>, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|s| {
        el.select(s)
            .map(|e| {
                e.value()
                    .attr(attr)
                    .map(normalize)
                    .unwrap_or_else(|| text_of(e))
            })
            .find(|t| !t.is_empty())
    })
}

/// First text node carrying one of the name keywords.
fn keyword_text(el: ElementRef<'_>, rules: &ParseRules) -> Option<String> {
    el.text()
        .map(normalize)
        .find(|t| !t.is_empty() && rules.has_keyword(t))
}

fn price_in(el: ElementRef<'_>, rules: &ParseRules) -> Option<String> {
    rules
        .price
        .find(&text_of(el))
        .map(|m| m.as_str().to_string())
}

/// All values of the first color selector that matches, comma-joined.
fn colors(el: ElementRef<'_>, rules: &ParseRules) -> Option<String> {
    rules.colors.iter().find_map(|s| {
        let values: Vec<String> = el
            .select(s)
            .map(|c| {
                c.value()
                    .attr("data-color")
                    .map(normalize)
                    .unwrap_or_else(|| text_of(c))
            })
            .filter(|v| !v.is_empty())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    })
}

/// Resolve named and numeric character references in a raw markup slice.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    Html::parse_fragment(raw).root_element().text().collect()
}

/// Same as [`decode_entities`] with attribute-value rules, so `&copy=` in a
/// query string stays literal.
fn decode_href(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    Html::parse_fragment(&format!("<a href=\"{raw}\"></a>"))
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|el| el.value().attr("href").map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, shelfscan_config::ParserConfig};

    fn rules() -> ParseRules {
        ParseRules::from_config(&ParserConfig::default()).unwrap()
    }

    const GRID: &str = r#"<html><body>
<h-grid-results>
  <h-grid-result-item>
    <a id="product-item-meta-link-1" href="/jp/ja/product/kelly-H0001/">
      <h3 class="product-item-name">ケリー 25 バッグ</h3>
    </a>
    <span class="price">¥1,234,000</span>
    <div class="product-item-colors"><span data-color="Noir"></span><span data-color="Gold"></span></div>
  </h-grid-result-item>
  <h-grid-result-item>
    <a id="product-item-meta-link-2" href="/jp/ja/product/wallet-H0002/"><span>財布 ベアン</span></a>
    <p>税込 ¥300,000</p>
  </h-grid-result-item>
  <h-grid-result-item>
    <a id="product-item-meta-link-3" href="/jp/ja/product/kelly-H0001/"><h3>ケリー 25 バッグ</h3></a>
  </h-grid-result-item>
  <h-grid-result-item>
    <h3>リンクなし</h3>
  </h-grid-result-item>
</h-grid-results>
</body></html>"#;

    #[test]
    fn container_strategy_extracts_all_fields() {
        let out = parse_detailed(GRID, &rules());
        assert_eq!(out.strategy, Strategy::Primary);
        assert_eq!(out.containers_found, 4);
        assert_eq!(out.records.len(), 2);

        let kelly = &out.records[0];
        assert_eq!(kelly.name, "ケリー 25 バッグ");
        assert_eq!(kelly.url, "https://www.hermes.com/jp/ja/product/kelly-H0001/");
        assert_eq!(kelly.price.as_deref(), Some("¥1,234,000"));
        assert_eq!(kelly.color.as_deref(), Some("Noir, Gold"));
        assert_eq!(kelly.sku.as_deref(), Some("kelly-H0001"));
    }

    #[test]
    fn name_and_price_fall_back_to_text() {
        let records = parse(GRID, &rules());
        let wallet = &records[1];
        assert_eq!(wallet.name, "財布 ベアン");
        assert_eq!(wallet.price.as_deref(), Some("¥300,000"));
        assert_eq!(wallet.color, None);
    }

    #[test]
    fn explicit_sku_beats_url() {
        let html = r#"<div class="product-item" data-sku="H9">
            <a href="/product/x-1/">ケリー</a><span class="sku" data-sku="H077">H077</span></div>"#;
        let records = parse(html, &rules());
        assert_eq!(records[0].sku.as_deref(), Some("H077"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let r = rules();
        assert_eq!(parse(GRID, &r), parse(GRID, &r));
    }

    #[test]
    fn link_strategy_used_without_containers() {
        let html = r#"<html><body>
          <div class="card"><a href="/jp/ja/product/birkin-H9/">詳細</a><h3>バーキン 30</h3><span class="price">¥2,000,000</span></div>
          <div class="card"><a href="/jp/ja/product/birkin-H9/">again</a><h3>バーキン 30</h3></div>
          <a href="/jp/ja/about/">About</a>
        </body></html>"#;
        let out = parse_detailed(html, &rules());
        assert_eq!(out.strategy, Strategy::Links);
        assert_eq!(out.containers_found, 0);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].name, "バーキン 30");
        assert_eq!(out.records[0].price.as_deref(), Some("¥2,000,000"));
        assert_eq!(out.records[0].sku.as_deref(), Some("birkin-H9"));
    }

    #[test]
    fn pattern_strategy_reads_script_payloads() {
        let html = r#"<html><body><script>
            var tpl = '<a href="/jp/ja/product/bag-H1/?a=1&amp;b=2"><span>バッグ ピコタン</span><em>¥500,000</em></a>';
        </script></body></html>"#;
        let out = parse_detailed(html, &rules());
        assert_eq!(out.strategy, Strategy::Pattern);
        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.url, "https://www.hermes.com/jp/ja/product/bag-H1/?a=1&b=2");
        assert_eq!(rec.name, "バッグ ピコタン");
        assert_eq!(rec.price.as_deref(), Some("¥500,000"));
    }

    #[test]
    fn pattern_strategy_decodes_numeric_references() {
        let html = r#"<script>
            var tpl = '<a href="/jp/ja/product/bag-H2/?q&#x3D;1&#38;r=2"><span>&#12496;&#x30C3;グ &quot;ミニ&quot;</span></a>';
        </script>"#;
        let out = parse_detailed(html, &rules());
        assert_eq!(out.strategy, Strategy::Pattern);
        let rec = &out.records[0];
        assert_eq!(rec.url, "https://www.hermes.com/jp/ja/product/bag-H2/?q=1&r=2");
        assert_eq!(rec.name, "バッグ \"ミニ\"");
        assert_eq!(rec.sku.as_deref(), Some("bag-H2"));
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a&amp;b", "a&b")]
    #[case("&#x3D;&#61;", "==")]
    #[case("&#12354;&nbsp;x", "あ\u{a0}x")]
    fn entities_are_decoded(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_entities(raw), expected);
    }

    #[test]
    fn href_keeps_bare_ampersands_in_queries() {
        assert_eq!(decode_href("/product/a/?x=1&copy=2"), "/product/a/?x=1&copy=2");
        assert_eq!(decode_href("/product/a/?x=1&amp;y=2"), "/product/a/?x=1&y=2");
    }

    #[test]
    fn pattern_strategy_is_bounded() {
        let tiles: String = (0..30)
            .map(|i| format!(r#"<a href="/product/bag-{i}/"><b>バッグ {i}</b></a>"#))
            .collect();
        let html = format!("<script>var t = '{tiles}';</script>");
        let records = parse(&html, &rules());
        assert_eq!(records.len(), 20);
        assert_eq!(records[19].name, "バッグ 19");
    }

    #[test]
    fn empty_page_yields_nothing() {
        let out = parse_detailed("<html><body><p>該当なし</p></body></html>", &rules());
        assert_eq!(out.strategy, Strategy::Unmatched);
        assert!(out.records.is_empty());
        assert_eq!(parse("", &rules()), Vec::new());
    }
}
