//! Checkout wizard: Shipping → Payment → Review → Confirmed.
//!
//! Forward moves are gated by field validation; the only backward move is a
//! single step back from Payment or Review. Placing the order is the only
//! way out of Review, and the cart is cleared only after the server has
//! accepted the order.

use crate::api::ApiClient;
use crate::cart::CartStore;
use crate::error::{ApiError, ValidationError};
use crate::models::{Order, OrderStatus, PlaceOrderRequest, ShippingAddress};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Review,
    Confirmed,
}

impl CheckoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShippingDetails {
    pub full_name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    /// Optional
    pub phone: String,
}

impl ShippingDetails {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("full_name", &self.full_name),
            ("address_line", &self.address_line),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ] {
            require(&mut errors, field, value);
        }
        errors
    }

    fn to_address(&self) -> ShippingAddress {
        let phone = self.phone.trim();
        ShippingAddress {
            full_name: self.full_name.trim().to_string(),
            address_line: self.address_line.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    #[default]
    Card,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "card" | "credit" | "credit-card" => Some(Self::Card),
            "cash" | "cod" | "cash-on-delivery" | "cashondelivery" => Some(Self::CashOnDelivery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "Card",
            Self::CashOnDelivery => "CashOnDelivery",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub cardholder_name: String,
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvc: String,
}

impl PaymentDetails {
    pub fn cash_on_delivery() -> Self {
        Self {
            method: PaymentMethod::CashOnDelivery,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.method == PaymentMethod::Card {
            for (field, value) in [
                ("cardholder_name", &self.cardholder_name),
                ("card_number", &self.card_number),
                ("card_expiry", &self.card_expiry),
                ("card_cvc", &self.card_cvc),
            ] {
                require(&mut errors, field, value);
            }
        }
        errors
    }

    /// Card number with all but the last four digits hidden.
    pub fn masked_card(&self) -> String {
        let digits: Vec<char> = self
            .card_number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("**** {}", tail)
    }
}

fn require(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "is required"));
    }
}

/// What the user sees after a successful order.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub order_id: i64,
    pub claim_code: String,
    pub status: OrderStatus,
    pub total_price: f64,
    /// False when the order went through but `DELETE /api/Cart` did not, so
    /// the ordered items are still in the cart.
    pub cart_cleared: bool,
}

impl Confirmation {
    fn new(order: &Order, cart_cleared: bool) -> Self {
        Self {
            order_id: order.id,
            claim_code: order.claim_code.clone(),
            status: order.status,
            total_price: order.total_price,
            cart_cleared,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Please fix: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Cannot {action} from the {step} step")]
    WrongStep {
        action: &'static str,
        step: CheckoutStep,
    },

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Server accepted the order but returned no claim code")]
    MissingClaimCode,

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Default)]
pub struct Checkout {
    step: CheckoutStep,
    shipping: ShippingDetails,
    payment: PaymentDetails,
    confirmation: Option<Confirmation>,
}

impl Checkout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn shipping(&self) -> &ShippingDetails {
        &self.shipping
    }

    pub fn payment(&self) -> &PaymentDetails {
        &self.payment
    }

    #[cfg(test)]
    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn set_shipping(&mut self, details: ShippingDetails) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Shipping, "edit shipping")?;
        self.shipping = details;
        Ok(())
    }

    pub fn set_payment(&mut self, details: PaymentDetails) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Payment, "edit payment")?;
        self.payment = details;
        Ok(())
    }

    /// Advance one step if the forms collected so far are valid.
    pub fn next(&mut self) -> Result<CheckoutStep, CheckoutError> {
        let (errors, to) = match self.step {
            CheckoutStep::Shipping => (self.shipping.validate(), CheckoutStep::Payment),
            CheckoutStep::Payment => {
                let mut errors = self.shipping.validate();
                errors.extend(self.payment.validate());
                (errors, CheckoutStep::Review)
            }
            step @ (CheckoutStep::Review | CheckoutStep::Confirmed) => {
                return Err(CheckoutError::WrongStep {
                    action: "continue",
                    step,
                })
            }
        };
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }
        self.step = to;
        Ok(to)
    }

    pub fn back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.step = match self.step {
            CheckoutStep::Payment => CheckoutStep::Shipping,
            CheckoutStep::Review => CheckoutStep::Payment,
            step => {
                return Err(CheckoutError::WrongStep {
                    action: "go back",
                    step,
                })
            }
        };
        Ok(self.step)
    }

    /// Submit the order from Review.
    ///
    /// On any failure the wizard stays in Review so the user can retry.
    pub fn place_order(
        &mut self,
        api: &ApiClient,
        auth: &str,
        cart: &mut CartStore,
    ) -> Result<&Confirmation, CheckoutError> {
        self.expect_step(CheckoutStep::Review, "place an order")?;

        let mut errors = self.shipping.validate();
        errors.extend(self.payment.validate());
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }

        if cart.cart().is_none() {
            cart.fetch_cart(api, auth)?;
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order = api.place_order(auth, &self.build_request())?;
        if order.claim_code.trim().is_empty() {
            return Err(CheckoutError::MissingClaimCode);
        }
        tracing::info!(order_id = order.id, claim_code = %order.claim_code, "order placed");

        let cart_cleared = match cart.clear_cart(api, auth) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("order {} placed but cart was not cleared: {}", order.id, e);
                if cart.fetch_cart(api, auth).is_err() {
                    cart.reset();
                }
                false
            }
        };

        self.step = CheckoutStep::Confirmed;
        Ok(self.confirmation.insert(Confirmation::new(&order, cart_cleared)))
    }

    /// Start over with empty forms.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn expect_step(&self, expected: CheckoutStep, action: &'static str) -> Result<(), CheckoutError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    fn build_request(&self) -> PlaceOrderRequest {
        let card = self.payment.method == PaymentMethod::Card;
        let card_field = |value: &str| card.then(|| value.trim().to_string());
        PlaceOrderRequest {
            shipping_address: self.shipping.to_address(),
            payment_method: self.payment.method.as_str().to_string(),
            cardholder_name: card_field(&self.payment.cardholder_name),
            card_number: card_field(&self.payment.card_number),
            card_expiry: card_field(&self.payment.card_expiry),
            card_cvc: card_field(&self.payment.card_cvc),
        }
    }
}
