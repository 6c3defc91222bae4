//! Purchase flow state machine.
//!
//! ```text
//! Categories ──select──▶ Products ──select──▶ Product ──buy──▶ Confirm
//!     ▲                     │  ▲                 │               │ ▲
//!     └──────── back ───────┘  └────── back ─────┘◀──── back ────┤ │
//!                                                          place │ │ failed
//!                                                                ▼ │
//!                                                            Placing ──placed──▶ AwaitingPayment
//! ```
//!
//! Transitions are pure. The handler performs side effects (API calls)
//! and then feeds the outcome back in, e.g. [`Action::OrderPlaced`] after
//! the order was created. A confirm click first moves the session to
//! [`Step::Placing`], so a second click on the same button finds no
//! pending confirmation and cannot place another order.

use thiserror::Error;

use shopbot_core::{CategoryId, OrderId, ProductId};

/// Where a user is in the purchase flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Browsing the guild's categories.
    Categories,
    /// Browsing products; `None` lists the whole guild.
    Products { category: Option<CategoryId> },
    /// Looking at one product.
    Product {
        category: Option<CategoryId>,
        product: ProductId,
    },
    /// Order summary shown, waiting for confirmation.
    Confirm {
        category: Option<CategoryId>,
        product: ProductId,
    },
    /// Confirmed; the order is being created.
    Placing {
        category: Option<CategoryId>,
        product: ProductId,
    },
    /// Order placed; waiting for the processor.
    AwaitingPayment { order: OrderId },
}

/// Something the user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectCategory(CategoryId),
    SelectProduct(ProductId),
    Buy(ProductId),
    PlaceOrder(ProductId),
    OrderPlaced { product: ProductId, order: OrderId },
    OrderFailed,
    Back,
}

impl Step {
    const fn name(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Products { .. } => "products",
            Self::Product { .. } => "product",
            Self::Confirm { .. } => "confirm",
            Self::Placing { .. } => "placing",
            Self::AwaitingPayment { .. } => "awaiting_payment",
        }
    }

    /// Product waiting for confirmation, if any.
    #[must_use]
    pub const fn pending_confirmation(self) -> Option<ProductId> {
        match self {
            Self::Confirm { product, .. } => Some(product),
            _ => None,
        }
    }

    /// Move to the next step.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::UnexpectedAction` when the action does not fit
    /// the current step (a stale button, a replayed click), and
    /// `FlowError::CannotGoBack` from the first step or once an order is
    /// being placed.
    pub fn advance(self, action: Action) -> Result<Self, FlowError> {
        let next = match (self, action) {
            (Self::Categories, Action::SelectCategory(category)) => Self::Products {
                category: Some(category),
            },
            (Self::Products { category }, Action::SelectProduct(product)) => {
                Self::Product { category, product }
            }
            (Self::Product { category, product }, Action::Buy(chosen)) if chosen == product => {
                Self::Confirm { category, product }
            }
            (Self::Confirm { category, product }, Action::PlaceOrder(chosen))
                if chosen == product =>
            {
                Self::Placing { category, product }
            }
            (Self::Placing { product, .. }, Action::OrderPlaced { product: placed, order })
                if placed == product =>
            {
                Self::AwaitingPayment { order }
            }
            (Self::Placing { category, product }, Action::OrderFailed) => {
                Self::Confirm { category, product }
            }
            (
                Self::Categories | Self::Placing { .. } | Self::AwaitingPayment { .. },
                Action::Back,
            ) => {
                return Err(FlowError::CannotGoBack(self.name()));
            }
            (Self::Products { .. }, Action::Back) => Self::Categories,
            (Self::Product { category, .. }, Action::Back) => Self::Products { category },
            (Self::Confirm { category, product }, Action::Back) => {
                Self::Product { category, product }
            }
            (step, action) => {
                return Err(FlowError::UnexpectedAction {
                    step: step.name(),
                    action: action.name(),
                });
            }
        };
        Ok(next)
    }
}

impl Action {
    const fn name(self) -> &'static str {
        match self {
            Self::SelectCategory(_) => "select_category",
            Self::SelectProduct(_) => "select_product",
            Self::Buy(_) => "buy",
            Self::PlaceOrder(_) => "confirm",
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderFailed => "order_failed",
            Self::Back => "back",
        }
    }
}

/// Rejected flow transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("'{action}' is not possible while at '{step}'")]
    UnexpectedAction {
        step: &'static str,
        action: &'static str,
    },
    #[error("cannot go back from '{0}'")]
    CannotGoBack(&'static str),
    #[error("no purchase in progress")]
    NoSession,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CAT: CategoryId = CategoryId::new(1);
    const PROD: ProductId = ProductId::new(10);

    #[test]
    fn test_happy_path() {
        let order = OrderId::generate();
        let step = Step::Categories
            .advance(Action::SelectCategory(CAT))
            .and_then(|s| s.advance(Action::SelectProduct(PROD)))
            .and_then(|s| s.advance(Action::Buy(PROD)))
            .unwrap();
        assert_eq!(step.pending_confirmation(), Some(PROD));
        assert!(step.advance(Action::PlaceOrder(ProductId::new(99))).is_err());

        let step = step.advance(Action::PlaceOrder(PROD)).unwrap();
        assert_eq!(step.pending_confirmation(), None);
        let step = step
            .advance(Action::OrderPlaced {
                product: PROD,
                order,
            })
            .unwrap();
        assert_eq!(step, Step::AwaitingPayment { order });
    }

    #[test]
    fn test_out_of_order_rejected() {
        assert_eq!(
            Step::Categories.advance(Action::Buy(PROD)),
            Err(FlowError::UnexpectedAction {
                step: "categories",
                action: "buy",
            })
        );
        let products = Step::Products { category: None };
        assert!(products.advance(Action::SelectCategory(CAT)).is_err());
    }

    #[test]
    fn test_stale_product_button_rejected() {
        let step = Step::Product {
            category: None,
            product: PROD,
        };
        assert!(step.advance(Action::Buy(ProductId::new(11))).is_err());

        let placing = Step::Placing {
            category: None,
            product: PROD,
        };
        let placed_other = Action::OrderPlaced {
            product: ProductId::new(11),
            order: OrderId::generate(),
        };
        assert!(placing.advance(placed_other).is_err());
    }

    #[test]
    fn test_confirm_only_once() {
        let confirm = Step::Confirm {
            category: Some(CAT),
            product: PROD,
        };
        let placing = confirm.advance(Action::PlaceOrder(PROD)).unwrap();
        assert_eq!(
            placing.advance(Action::PlaceOrder(PROD)),
            Err(FlowError::UnexpectedAction {
                step: "placing",
                action: "confirm",
            })
        );
        assert_eq!(
            placing.advance(Action::Back),
            Err(FlowError::CannotGoBack("placing"))
        );
    }

    #[test]
    fn test_failed_order_returns_to_confirm() {
        let placing = Step::Placing {
            category: Some(CAT),
            product: PROD,
        };
        assert_eq!(
            placing.advance(Action::OrderFailed).unwrap(),
            Step::Confirm {
                category: Some(CAT),
                product: PROD
            }
        );
        assert!(Step::Categories.advance(Action::OrderFailed).is_err());
    }

    #[test]
    fn test_back_moves_one_step_up() {
        let confirm = Step::Confirm {
            category: Some(CAT),
            product: PROD,
        };
        let product = confirm.advance(Action::Back).unwrap();
        assert_eq!(
            product,
            Step::Product {
                category: Some(CAT),
                product: PROD
            }
        );
        let products = product.advance(Action::Back).unwrap();
        assert_eq!(products, Step::Products { category: Some(CAT) });
        assert_eq!(products.advance(Action::Back).unwrap(), Step::Categories);
    }

    #[test]
    fn test_back_refused_at_edges() {
        assert_eq!(
            Step::Categories.advance(Action::Back),
            Err(FlowError::CannotGoBack("categories"))
        );
        let waiting = Step::AwaitingPayment {
            order: OrderId::generate(),
        };
        assert!(matches!(
            waiting.advance(Action::Back),
            Err(FlowError::CannotGoBack(_))
        ));
    }
}
