//! Stock validation
//!
//! Revalidates requested quantities against a fresh catalog snapshot
//! immediately before committing payment. Pure: a function of the cart and
//! the snapshot, no side effects and no partial commits. Any non-empty
//! rejection list is a hard stop for the whole checkout.

use shared::cart::CartLine;
use shared::catalog::CatalogProduct;
use shared::order::{LineRejection, RejectReason};
use std::collections::HashMap;

/// Validate every cart line against the catalog snapshot
///
/// A line is rejected when its product is absent from the catalog or when
/// `stock < quantity`. The snapshot must be fetched fresh at validation
/// time; a page-load copy can be stale under concurrent purchases.
pub fn validate_cart(
    cart: &[CartLine],
    catalog: &[CatalogProduct],
) -> Result<(), Vec<LineRejection>> {
    let by_id: HashMap<&str, &CatalogProduct> =
        catalog.iter().map(|p| (p.id.as_str(), p)).collect();

    let rejections: Vec<LineRejection> = cart
        .iter()
        .filter_map(|line| {
            let reason = match by_id.get(line.product_id.as_str()) {
                None => RejectReason::ProductNotFound,
                Some(product) if product.stock < line.quantity => {
                    RejectReason::InsufficientStock {
                        available: product.stock,
                        requested: line.quantity,
                    }
                }
                Some(_) => return None,
            };
            Some(LineRejection {
                product_id: line.product_id.clone(),
                reason,
            })
        })
        .collect();

    if rejections.is_empty() {
        Ok(())
    } else {
        Err(rejections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, stock: u32) -> CatalogProduct {
        CatalogProduct {
            id: id.into(),
            name: id.to_uppercase(),
            price: 10.0,
            stock,
            image: None,
        }
    }

    fn cart_line(id: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: id.into(),
            name: id.to_uppercase(),
            unit_price: 10.0,
            quantity,
            image: None,
        }
    }

    #[test]
    fn accepts_cart_within_stock() {
        let catalog = vec![product("a", 5), product("b", 1)];
        let cart = vec![cart_line("a", 2), cart_line("b", 1)];
        assert!(validate_cart(&cart, &catalog).is_ok());
    }

    #[test]
    fn rejects_insufficient_stock_with_counts() {
        let catalog = vec![product("x", 1)];
        let cart = vec![cart_line("x", 2)];
        let rejections = validate_cart(&cart, &catalog).unwrap_err();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].product_id, "x");
        assert_eq!(
            rejections[0].reason,
            RejectReason::InsufficientStock {
                available: 1,
                requested: 2
            }
        );
    }

    #[test]
    fn rejects_unknown_product() {
        let catalog = vec![product("a", 5)];
        let cart = vec![cart_line("ghost", 1)];
        let rejections = validate_cart(&cart, &catalog).unwrap_err();
        assert_eq!(rejections[0].reason, RejectReason::ProductNotFound);
    }

    #[test]
    fn collects_all_rejections_not_just_first() {
        let catalog = vec![product("a", 0)];
        let cart = vec![cart_line("a", 1), cart_line("ghost", 1)];
        let rejections = validate_cart(&cart, &catalog).unwrap_err();
        assert_eq!(rejections.len(), 2);
    }

    #[test]
    fn exact_stock_match_is_accepted() {
        let catalog = vec![product("a", 3)];
        let cart = vec![cart_line("a", 3)];
        assert!(validate_cart(&cart, &catalog).is_ok());
    }
}
