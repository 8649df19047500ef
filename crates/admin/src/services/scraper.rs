//! Product page scraper for dropshipping imports.
//!
//! Each known retailer has an ordered selector chain per field; the first
//! selector that yields a value wins. Open Graph meta tags and JSON-LD
//! `Product` data fill whatever the selectors leave empty.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Desktop browser identity; several retailers serve bot pages otherwise.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "ar,en-US;q=0.9,en;q=0.8";

const MAX_NAME_CHARS: usize = 300;
const MAX_DESCRIPTION_CHARS: usize = 2000;
const MAX_GALLERY_IMAGES: usize = 10;

/// Name used when the page has none.
pub const UNNAMED_PRODUCT: &str = "منتج بدون اسم";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d*)?").expect("Invalid regex"));

/// Amazon thumbnail size suffix such as `._SS40_`.
static AMAZON_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._[A-Z]{2}\d+_").expect("Invalid regex"));

/// Scrape failures. The messages are shown to the admin as-is.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("انتهت مهلة الاتصال بالموقع")]
    Timeout,

    #[error("فشل الاتصال بالموقع")]
    Connect,

    #[error("خطأ: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Product data read from a retailer page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedProduct {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub source_site: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Amazon,
    Noon,
    Jumia,
    Generic,
}

impl Site {
    fn detect(source_site: &str) -> Self {
        if source_site.contains("amazon") {
            Self::Amazon
        } else if source_site.contains("noon.com") {
            Self::Noon
        } else if source_site.contains("jumia") {
            Self::Jumia
        } else {
            Self::Generic
        }
    }

    const fn name_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &["#productTitle", "#title span", "h1#title"],
            Self::Noon => &[r#"h1[data-qa="pdp-name"]"#, "h1.productTitle", "h1"],
            Self::Jumia => &["h1.-fs20", "h1.-pts", "h1"],
            Self::Generic => &[
                "h1",
                r#"[itemprop="name"]"#,
                ".product-title",
                ".product_title",
                "#productTitle",
            ],
        }
    }

    const fn price_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &[
                ".a-price .a-offscreen",
                "#priceblock_ourprice",
                "#priceblock_dealprice",
                "#price_inside_buybox",
                ".a-price-whole",
                "#corePrice_feature_div .a-offscreen",
                "span.a-price span.a-offscreen",
            ],
            Self::Noon => &[r#"strong[data-qa="div-price-now"]"#, ".priceNow", "span.price"],
            Self::Jumia => &[".-b.-ltr", ".-fs24", "span.-b.-ltr"],
            Self::Generic => &[
                r#"[itemprop="price"]"#,
                ".price",
                ".product-price",
                ".current-price",
                "span.price",
            ],
        }
    }

    const fn description_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &[
                "#feature-bullets",
                "#productDescription",
                "#aplus_feature_div",
                r#"[itemprop="description"]"#,
            ],
            Self::Jumia => &[
                ".markup.-mhm.-pvl.-oxa.-sc",
                ".card-body.-fs14",
                r#"[itemprop="description"]"#,
            ],
            Self::Noon | Self::Generic => &[
                r#"[itemprop="description"]"#,
                ".product-description",
                "#productDescription",
                ".description",
            ],
        }
    }

    const fn image_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &[
                "#landingImage",
                "#imgBlkFront",
                "#main-image-container img",
                "#imageBlock img",
            ],
            _ => &[
                r#"[itemprop="image"]"#,
                ".product-image img",
                "#main-image",
                ".gallery-image img",
                "img.product-image",
            ],
        }
    }

    const fn image_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &["data-old-hires", "src", "data-src"],
            _ => &["src", "data-src", "data-lazy"],
        }
    }

    const fn gallery_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Amazon => &[
                "#altImages img",
                ".imageThumbnail img",
                "#imageBlock_feature_div img",
            ],
            _ => &[
                ".product-gallery img",
                ".thumbnail img",
                "[data-gallery] img",
                ".product-images img",
            ],
        }
    }
}

/// Host of `url` without a leading `www.`.
#[must_use]
pub fn source_site(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_owned()
}

/// Prefix `https://` when the admin pasted a bare host.
#[must_use]
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_all<'a>(doc: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .map(|sel| doc.select(&sel).collect())
        .unwrap_or_default()
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| doc.select(&sel).next())
}

fn meta_property(doc: &Html, property: &str) -> Option<String> {
    select_first(doc, &format!(r#"meta[property="{property}"]"#))
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
}

fn first_attr(el: &ElementRef<'_>, attributes: &[&str]) -> Option<String> {
    attributes
        .iter()
        .find_map(|a| el.value().attr(a))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(String::from)
}

/// First number in a price string. Arabic digits and decimal separators are
/// folded to ASCII, thousands separators dropped.
#[must_use]
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let folded: String = raw
        .chars()
        .map(|c| match c {
            '٫' => '.',
            '٠'..='٩' => char::from_digit(u32::from(c) - u32::from('٠'), 10).unwrap_or(c),
            _ => c,
        })
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    NUMBER_RE
        .find(&folded)
        .and_then(|m| m.as_str().trim_end_matches('.').parse::<Decimal>().ok())
}

fn strip_amazon_size(src: &str) -> String {
    if src.contains("_SS") {
        AMAZON_SIZE_RE.replace_all(src, ".").into_owned()
    } else {
        src.to_owned()
    }
}

/// Fields read from `script[type="application/ld+json"]`.
#[derive(Debug, Default, PartialEq, Eq)]
struct JsonLdProduct {
    name: Option<String>,
    price: Option<Decimal>,
    description: Option<String>,
    image: Option<String>,
}

fn is_product_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("product"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("product"))),
        _ => false,
    }
}

fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_ld_image(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(list) => json_ld_image(list.first()),
        Value::Object(obj) => json_string(obj.get("url").or_else(|| obj.get("contentUrl"))),
        _ => None,
    }
}

fn json_ld_product(doc: &Html) -> Option<JsonLdProduct> {
    let product = select_all(doc, r#"script[type="application/ld+json"]"#)
        .into_iter()
        .filter_map(|script| serde_json::from_str::<Value>(&script.text().collect::<String>()).ok())
        .find_map(|value| match value {
            Value::Array(list) => list
                .iter()
                .find(|v| is_product_type(v))
                .or_else(|| list.first())
                .cloned(),
            Value::Object(_) if is_product_type(&value) => Some(value),
            _ => None,
        })?;

    let offer = match product.get("offers") {
        Some(Value::Array(list)) => list.first(),
        other => other,
    };

    Some(JsonLdProduct {
        name: json_string(product.get("name")),
        price: json_string(offer.and_then(|o| o.get("price"))).and_then(|p| parse_price(&p)),
        description: json_string(product.get("description")),
        image: json_ld_image(product.get("image")),
    })
}

/// Extract product fields from a fetched page. `final_url` is the address
/// after redirects; relative image links resolve against it.
#[must_use]
pub fn parse_product(html: &str, final_url: &Url) -> ScrapedProduct {
    let doc = Html::parse_document(html);
    let site_name = source_site(final_url);
    let site = Site::detect(&site_name);
    let ld = json_ld_product(&doc).unwrap_or_default();

    let name = site
        .name_selectors()
        .iter()
        .filter_map(|s| select_first(&doc, s))
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
        .or_else(|| meta_property(&doc, "og:title"))
        .or(ld.name)
        .map(|n| truncate(&n, MAX_NAME_CHARS));

    let price = site
        .price_selectors()
        .iter()
        .filter_map(|s| select_first(&doc, s))
        .find_map(|el| {
            let raw = el
                .value()
                .attr("content")
                .map_or_else(|| element_text(&el), str::to_owned);
            parse_price(&raw)
        })
        .or_else(|| meta_property(&doc, "product:price:amount").and_then(|p| parse_price(&p)))
        .or(ld.price);

    let description = site
        .description_selectors()
        .iter()
        .find_map(|s| select_first(&doc, s))
        .map(|el| element_text(&el))
        .filter(|d| !d.is_empty())
        .or_else(|| meta_property(&doc, "og:description"))
        .or(ld.description)
        .map(|d| truncate(&d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let mut image_url = site
        .image_selectors()
        .iter()
        .filter_map(|s| select_first(&doc, s))
        .find_map(|el| first_attr(&el, site.image_attributes()))
        .and_then(|src| resolve(final_url, &src));
    if image_url.is_none() && site == Site::Amazon {
        image_url = select_first(&doc, "#landingImage, #imgBlkFront")
            .and_then(|el| el.value().attr("data-a-dynamic-image"))
            .and_then(|raw| serde_json::from_str::<serde_json::Map<String, Value>>(raw).ok())
            .and_then(|images| images.keys().next().cloned());
    }
    let image_url = image_url
        .or_else(|| meta_property(&doc, "og:image").and_then(|src| resolve(final_url, &src)))
        .or_else(|| ld.image.and_then(|src| resolve(final_url, &src)));

    let mut additional_images: Vec<String> = Vec::new();
    for selector in site.gallery_selectors() {
        let images = select_all(&doc, selector);
        for img in images.iter().take(MAX_GALLERY_IMAGES) {
            let Some(src) = first_attr(img, &["data-old-hires", "src", "data-src", "data-lazy"]) else {
                continue;
            };
            if src.contains("sprite") || src.contains("1x1") || src.contains("grey-pixel") {
                continue;
            }
            let src = if site == Site::Amazon {
                strip_amazon_size(&src)
            } else {
                src
            };
            if let Some(full) = resolve(final_url, &src)
                && image_url.as_deref() != Some(full.as_str())
                && !additional_images.contains(&full)
            {
                additional_images.push(full);
            }
        }
        if !additional_images.is_empty() {
            break;
        }
    }

    ScrapedProduct {
        name: name.unwrap_or_else(|| UNNAMED_PRODUCT.to_owned()),
        price: price.unwrap_or_default(),
        description,
        image_url,
        additional_images,
        source_site: site_name,
    }
}

/// HTTP front end of the scraper.
#[derive(Clone)]
pub struct ProductScraper {
    client: reqwest::Client,
}

impl ProductScraper {
    /// Create a scraper with its own browser-like HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError` if the HTTP client fails to build.
    pub fn new() -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and parse a product page.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Timeout`, `Connect`, or `Other` for invalid
    /// URLs, failed requests and error statuses.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedProduct, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::Other(e.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await?
            .error_for_status()?;

        let final_url = response.url().clone();
        let html = response.text().await?;
        let product = parse_product(&html, &final_url);

        tracing::info!(
            source_site = %product.source_site,
            gallery = product.additional_images.len(),
            "Scraped product page"
        );
        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price("EGP 1,299.50"), Some(Decimal::new(129_950, 2)));
        assert_eq!(parse_price("١٢٥٫٥ جنيه"), Some(Decimal::new(1255, 1)));
        assert_eq!(parse_price("450."), Some(Decimal::from(450)));
        assert_eq!(parse_price("غير متوفر"), None);
    }

    #[test]
    fn test_normalize_url_and_site() {
        assert_eq!(normalize_url(" noon.com/p/1 "), "https://noon.com/p/1");
        assert_eq!(normalize_url("http://x.y"), "http://x.y");
        assert_eq!(source_site(&url("https://www.amazon.eg/dp/1")), "amazon.eg");
    }

    #[test]
    fn test_amazon_page() {
        let html = r#"<html><body>
            <span id="productTitle">  زيت الأرغان  </span>
            <span class="a-price"><span class="a-offscreen">EGP 350.00</span></span>
            <div id="feature-bullets"><li>طبيعي</li><li>١٠٠ مل</li></div>
            <img id="landingImage" data-old-hires="https://m.media-amazon.com/images/I/big.jpg" src="small.jpg">
            <div id="altImages">
              <img src="https://m.media-amazon.com/images/I/a._SS40_.jpg">
              <img src="https://m.media-amazon.com/images/I/sprite.png">
              <img src="https://m.media-amazon.com/images/I/a._SS40_.jpg">
              <img src="https://m.media-amazon.com/images/I/big.jpg">
            </div>
        </body></html>"#;
        let product = parse_product(html, &url("https://www.amazon.eg/dp/B0"));
        assert_eq!(product.name, "زيت الأرغان");
        assert_eq!(product.price, Decimal::from(350));
        assert_eq!(product.description, "طبيعي ١٠٠ مل");
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/big.jpg")
        );
        assert_eq!(
            product.additional_images,
            vec!["https://m.media-amazon.com/images/I/a.jpg"]
        );
        assert_eq!(product.source_site, "amazon.eg");
    }

    #[test]
    fn test_generic_page_falls_back_to_meta() {
        let html = r#"<html><head>
            <meta property="og:title" content="سيروم">
            <meta property="product:price:amount" content="199">
            <meta property="og:description" content="وصف">
            <meta property="og:image" content="/img/main.png">
        </head><body></body></html>"#;
        let product = parse_product(html, &url("https://shop.example/p/9"));
        assert_eq!(product.name, "سيروم");
        assert_eq!(product.price, Decimal::from(199));
        assert_eq!(product.description, "وصف");
        assert_eq!(product.image_url.as_deref(), Some("https://shop.example/img/main.png"));
    }

    #[test]
    fn test_json_ld_fills_missing_fields() {
        let html = r#"<html><head><script type="application/ld+json">
            [{"@type": "BreadcrumbList"},
             {"@type": "product", "name": "كريم", "description": "مرطب",
              "image": [{"url": "https://cdn.example/c.jpg"}],
              "offers": [{"price": "120.5"}]}]
        </script></head><body></body></html>"#;
        let product = parse_product(html, &url("https://shop.example/p/1"));
        assert_eq!(product.name, "كريم");
        assert_eq!(product.price, Decimal::new(1205, 1));
        assert_eq!(product.description, "مرطب");
        assert_eq!(product.image_url.as_deref(), Some("https://cdn.example/c.jpg"));
    }

    #[test]
    fn test_empty_page_defaults() {
        let product = parse_product("<html></html>", &url("https://jumia.com.eg/x"));
        assert_eq!(product.name, UNNAMED_PRODUCT);
        assert_eq!(product.price, Decimal::ZERO);
        assert!(product.image_url.is_none());
        assert!(product.additional_images.is_empty());
    }
}
