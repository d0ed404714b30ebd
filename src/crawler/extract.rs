use tracing::warn;
use url::Url;

use crate::browser::session::ProductListSession;
use crate::crawler::job::{BrandJob, ProductRecord};
use crate::error::SessionError;

/// Extract product records from a fully-loaded listing page.
///
/// A card missing its name or link is logged and skipped; it never aborts
/// the job. Relative links are resolved against the site's base origin.
pub async fn extract_products<S>(
    session: &mut S,
    job: &BrandJob,
    base_url: &Url,
) -> Result<Vec<ProductRecord>, SessionError>
where
    S: ProductListSession + ?Sized,
{
    let cards = session.card_fields().await?;

    let mut products = Vec::with_capacity(cards.len());
    for (index, card) in cards.into_iter().enumerate() {
        let name = match card.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!("skipping card {} of '{}': no product name", index, job.name);
                continue;
            }
        };

        let href = match card.href {
            Some(href) => href,
            None => {
                warn!("skipping card {} of '{}': no product link", index, job.name);
                continue;
            }
        };

        let url = match absolutize(base_url, &href) {
            Some(url) => url,
            None => {
                warn!(
                    "skipping card {} of '{}': unresolvable link '{}'",
                    index, job.name, href
                );
                continue;
            }
        };

        products.push(ProductRecord {
            name,
            url,
            brand_name: job.name.clone(),
            brand_url: job.url.clone(),
        });
    }

    Ok(products)
}

/// Resolve a possibly-relative link against the site base origin.
fn absolutize(base: &Url, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => base.join(href).ok().map(|u| u.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::session::{CardFields, MockProductListSession};

    fn test_job() -> BrandJob {
        BrandJob {
            id: 7,
            name: "Borges".to_string(),
            url: "https://shop.example.com/brand/Borges".to_string(),
        }
    }

    fn base() -> Url {
        Url::parse("https://shop.example.com").expect("valid base url")
    }

    fn card(name: Option<&str>, href: Option<&str>) -> CardFields {
        CardFields {
            name: name.map(String::from),
            href: href.map(String::from),
        }
    }

    #[tokio::test]
    async fn skips_cards_missing_either_field() {
        let mut session = MockProductListSession::new();
        session.expect_card_fields().returning(|| {
            Ok(vec![
                card(Some("Olive Oil 1L"), Some("/pn/olive-oil/pvid/111")),
                card(None, Some("/pn/mystery/pvid/222")),
                card(Some("Nameless Link"), None),
                card(Some("   "), Some("/pn/blank-name/pvid/333")),
            ])
        });

        let products = extract_products(&mut session, &test_job(), &base())
            .await
            .expect("extraction should succeed");

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Olive Oil 1L");
    }

    #[tokio::test]
    async fn resolves_relative_links_against_base() {
        let mut session = MockProductListSession::new();
        session.expect_card_fields().returning(|| {
            Ok(vec![
                card(Some("Relative"), Some("/pn/relative/pvid/1")),
                card(Some("Absolute"), Some("https://cdn.example.net/pn/abs/2")),
            ])
        });

        let products = extract_products(&mut session, &test_job(), &base())
            .await
            .expect("extraction should succeed");

        assert_eq!(
            products[0].url,
            "https://shop.example.com/pn/relative/pvid/1"
        );
        assert_eq!(products[1].url, "https://cdn.example.net/pn/abs/2");
    }

    #[tokio::test]
    async fn records_carry_their_brand_labels() {
        let mut session = MockProductListSession::new();
        session
            .expect_card_fields()
            .returning(|| Ok(vec![card(Some("Coffee"), Some("/pn/coffee/pvid/9"))]));

        let job = test_job();
        let products = extract_products(&mut session, &job, &base())
            .await
            .expect("extraction should succeed");

        assert_eq!(products[0].brand_name, job.name);
        assert_eq!(products[0].brand_url, job.url);
    }
}
