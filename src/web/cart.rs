//! Shopping cart kept in the session of the logged-in user.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::{current_user, pages, AppError, AppState};

const CART_KEY: &str = "cart";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// Adds `quantity` of `product`, merging with an existing line. Blank
/// product names are ignored and a zero quantity counts as one.
fn add_item(items: &mut Vec<CartItem>, product: &str, quantity: u32) {
    let product = product.trim();
    if product.is_empty() {
        return;
    }
    let quantity = quantity.max(1);

    match items.iter_mut().find(|item| item.product == product) {
        Some(item) => item.quantity = item.quantity.saturating_add(quantity),
        None => items.push(CartItem {
            product: product.to_owned(),
            quantity,
        }),
    }
}

async fn load(session: &Session) -> Result<Vec<CartItem>, AppError> {
    Ok(session
        .get::<Vec<CartItem>>(CART_KEY)
        .await?
        .unwrap_or_default())
}

/// `GET /cart`
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    if current_user(&state, &session).await?.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }
    let items = load(&session).await?;
    Ok(pages::cart(&items).into_response())
}

/// `POST /cart`
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCart>,
) -> Result<Redirect, AppError> {
    if current_user(&state, &session).await?.is_none() {
        return Ok(Redirect::to("/login"));
    }
    let mut items = load(&session).await?;
    add_item(&mut items, &form.product, form.quantity);
    session.insert(CART_KEY, items).await?;
    Ok(Redirect::to("/cart"))
}

/// `POST /cart/clear`
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    if current_user(&state, &session).await?.is_none() {
        return Ok(Redirect::to("/login"));
    }
    session.remove::<Vec<CartItem>>(CART_KEY).await?;
    Ok(Redirect::to("/cart"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_the_same_product_merges_quantities() {
        let mut items = Vec::new();
        add_item(&mut items, "mate", 1);
        add_item(&mut items, " mate ", 2);
        add_item(&mut items, "yerba", 0);
        assert_eq!(
            items,
            vec![
                CartItem {
                    product: "mate".into(),
                    quantity: 3
                },
                CartItem {
                    product: "yerba".into(),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn blank_products_are_ignored() {
        let mut items = Vec::new();
        add_item(&mut items, "   ", 5);
        assert!(items.is_empty());
    }
}
