//! Membership plans and the mock payment checkout.
//!
//! No payment provider is involved: a valid request yields a receipt and
//! nothing else happens.

use chrono::{Local, Months, NaiveDate};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::collection::Collection;
use crate::local_db_model::RecordId;
use crate::repository::Repository;
use crate::slot_store::SlotStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub price_inr: u32,
    pub duration_months: u32,
    pub features: &'static [&'static str],
}

pub static PLANS: [MembershipPlan; 3] = [
    MembershipPlan {
        id: "basic",
        name: "Basic Plan",
        price_inr: 100,
        duration_months: 1,
        features: &["1 Book at a time", "Basic Support"],
    },
    MembershipPlan {
        id: "standard",
        name: "Standard Plan",
        price_inr: 250,
        duration_months: 3,
        features: &["2 Books at a time", "Priority Support"],
    },
    MembershipPlan {
        id: "premium",
        name: "Premium Plan",
        price_inr: 500,
        duration_months: 6,
        features: &["Unlimited Books", "Premium Support"],
    },
];

pub fn find_plan(id: &str) -> Option<&'static MembershipPlan> {
    PLANS.iter().find(|plan| plan.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    Netbanking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub student_id: String,
    pub full_name: String,
    pub email: String,
    pub mobile: String,
    pub selected_plan: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reference: String,
    pub student_id: String,
    pub full_name: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount_inr: u32,
    pub payment_method: PaymentMethod,
    pub starts_on: NaiveDate,
    pub expires_on: NaiveDate,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<&'static MembershipPlan, AppResponse> {
        let mut errors = Vec::new();
        if self.student_id.trim().is_empty() {
            errors.push("studentId: This field is required");
        }
        if self.full_name.trim().is_empty() {
            errors.push("fullName: This field is required");
        }
        if !self.email.contains('@') {
            errors.push("email: Expected an email address");
        }
        if self.mobile.trim().is_empty() {
            errors.push("mobile: This field is required");
        }
        if !errors.is_empty() {
            return Err(AppResponse::ValidationError(errors.join("; ")));
        }

        find_plan(&self.selected_plan).ok_or_else(|| {
            AppResponse::NotFound(format!("Invalid plan selected: '{}'", self.selected_plan))
        })
    }
}

pub fn checkout(request: &PaymentRequest, today: NaiveDate) -> Result<PaymentReceipt, AppResponse> {
    let plan = request.validate()?;

    let expires_on = today
        .checked_add_months(Months::new(plan.duration_months))
        .ok_or_else(|| AppResponse::ValidationError("Membership would end past the calendar range".to_string()))?;
    let reference = format!(
        "PAY-{}-{:06}",
        today.format("%Y%m%d"),
        rand::thread_rng().gen_range(0..1_000_000u32)
    );

    info!(
        "Mock payment {reference}: {} for student {} via {:?}",
        plan.id, request.student_id, request.payment_method
    );

    Ok(PaymentReceipt {
        reference,
        student_id: request.student_id.clone(),
        full_name: request.full_name.clone(),
        plan_id: plan.id.to_string(),
        plan_name: plan.name.to_string(),
        amount_inr: plan.price_inr,
        payment_method: request.payment_method,
        starts_on: today,
        expires_on,
    })
}

/// [`checkout`] for a student that must exist in the store.
pub fn checkout_for_student<S: SlotStore + ?Sized>(
    store: &S,
    request: &PaymentRequest,
) -> Result<PaymentReceipt, AppResponse> {
    request.validate()?;
    let id = RecordId::new(request.student_id.clone());
    if Repository::new(store, Collection::Students).resolve(&id)?.is_none() {
        return Err(AppResponse::NotFound(format!("No student found with id: {id}")));
    }
    checkout(request, Local::now().date_naive())
}
