//! API-facing request/response models and handlers.
//!
//! Handlers accept raw JSON bodies or query-string ids, run the operation
//! under a [`RequestContext`], and turn the outcome into an [`ApiResponse`]
//! carrying an HTTP-style status, a message, and a typed payload.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::builders::CounsellorService;
use crate::core::{
    AssignmentOutcome, CapacityError, CapacityResult, CounsellorDetail, CounsellorId,
    CounsellorSummary, CounsellorUpdate, LeadId, NewCounsellor, NewLead, Release, RequestContext,
};

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP-style status code.
    pub status: u16,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response.
    pub fn ok(status: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failed response without payload.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Serialize the envelope.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize response");
            r#"{"status":500,"success":false,"message":"error serializing response"}"#.to_string()
        })
    }
}

impl<T: Serialize> From<CapacityError> for ApiResponse<T> {
    fn from(err: CapacityError) -> Self {
        let status = status_for(&err);
        let message = match &err {
            CapacityError::Storage(detail) => {
                tracing::error!(detail = %detail, "storage failure surfaced to caller");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        Self::error(status, message)
    }
}

/// HTTP-style status for an error.
#[must_use]
pub const fn status_for(err: &CapacityError) -> u16 {
    match err {
        CapacityError::InvalidInput(_) => 400,
        CapacityError::NotFound { .. } => 404,
        CapacityError::CapacityExceeded { .. } | CapacityError::Conflict(_) => 409,
        CapacityError::ZeroCapacity(_) => 422,
        CapacityError::Cancelled => 499,
        CapacityError::TimedOut(_) => 504,
        CapacityError::Storage(_) => 500,
    }
}

/// Body of an assignment request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignLeadRequest {
    /// Lead to assign.
    #[serde(default)]
    pub lead_id: LeadId,
    /// Target counsellor.
    #[serde(default)]
    pub counsellor_id: CounsellorId,
}

/// Body of an unassignment request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnassignLeadRequest {
    /// Lead to detach.
    #[serde(default)]
    pub lead_id: LeadId,
}

/// Payload returned after creating a counsellor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCounsellor {
    /// New id.
    pub id: CounsellorId,
    /// Name as stored.
    pub name: String,
    /// Email as stored.
    pub email: String,
    /// Effective capacity after defaulting.
    pub max_capacity: u32,
}

/// Payload naming a counsellor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounsellorRef {
    /// Counsellor id.
    pub counsellor_id: CounsellorId,
}

/// Payload naming a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRef {
    /// Lead id.
    pub lead_id: LeadId,
}

/// Payload returned after an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// Assigned lead.
    pub lead_id: LeadId,
    /// Counsellor now holding it.
    pub counsellor_id: CounsellorId,
    /// Counsellor that released it, for reassignments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_counsellor_id: Option<CounsellorId>,
}

/// Listing or detail, depending on whether an id was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounsellorsView {
    /// All counsellors.
    List(Vec<CounsellorSummary>),
    /// One counsellor with its leads.
    Detail(CounsellorDetail),
}

/// Parse a positive numeric id from a query-string value.
///
/// # Errors
///
/// [`CapacityError::InvalidInput`] for empty, non-numeric, or zero input.
pub fn parse_id(raw: &str, what: &str) -> CapacityResult<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CapacityError::InvalidInput(format!("{what} id is required")));
    }
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CapacityError::InvalidInput(format!("invalid {what} id"))),
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> CapacityResult<T> {
    serde_json::from_str(body).map_err(|e| CapacityError::InvalidInput(format!("invalid request: {e}")))
}

/// In-process operation surface over a [`CounsellorService`].
#[derive(Clone)]
pub struct CounsellorApi {
    service: CounsellorService,
    op_timeout: Option<Duration>,
}

impl CounsellorApi {
    /// Wrap a service; every handler call gets `op_timeout` as its deadline
    /// unless the caller's context already carries one.
    #[must_use]
    pub const fn new(service: CounsellorService, op_timeout: Option<Duration>) -> Self {
        Self {
            service,
            op_timeout,
        }
    }

    /// Underlying components.
    #[must_use]
    pub const fn service(&self) -> &CounsellorService {
        &self.service
    }

    /// Fresh context with the configured deadline.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        self.scoped(&RequestContext::background())
    }

    fn scoped(&self, ctx: &RequestContext) -> RequestContext {
        match (ctx.timeout(), self.op_timeout) {
            (None, Some(d)) => ctx.clone().with_timeout(d),
            _ => ctx.clone(),
        }
    }

    /// All counsellors with stats and live lead counts.
    pub async fn list_counsellors(
        &self,
        ctx: &RequestContext,
    ) -> ApiResponse<Vec<CounsellorSummary>> {
        match self.scoped(ctx).run(self.service.stats.list()).await {
            Ok(rows) => {
                let message = format!("Retrieved {} counsellors", rows.len());
                ApiResponse::ok(200, message, rows)
            }
            Err(e) => e.into(),
        }
    }

    /// One counsellor's stats and leads, by query-string id.
    pub async fn get_counsellor(
        &self,
        ctx: &RequestContext,
        raw_id: &str,
    ) -> ApiResponse<CounsellorDetail> {
        let result = async {
            let id = parse_id(raw_id, "counsellor")?;
            self.scoped(ctx).run(self.service.stats.detail(id)).await
        }
        .await;
        match result {
            Ok(detail) => ApiResponse::ok(200, "Counsellor details retrieved", detail),
            Err(e) => e.into(),
        }
    }

    /// Listing when `query_id` is absent or empty, detail otherwise.
    pub async fn get_counsellors(
        &self,
        ctx: &RequestContext,
        query_id: Option<&str>,
    ) -> ApiResponse<CounsellorsView> {
        match query_id.filter(|raw| !raw.is_empty()) {
            Some(raw) => remap(self.get_counsellor(ctx, raw).await, CounsellorsView::Detail),
            None => remap(self.list_counsellors(ctx).await, CounsellorsView::List),
        }
    }

    /// Create a counsellor from a JSON body.
    pub async fn create_counsellor(
        &self,
        ctx: &RequestContext,
        body: &str,
    ) -> ApiResponse<CreatedCounsellor> {
        let result = async {
            let fields: NewCounsellor = parse_body(body)?;
            let name = fields.name.clone();
            let email = fields.email.clone();
            let max_capacity = self.service.counsellors.effective_capacity(fields.max_capacity);
            let id = self
                .scoped(ctx)
                .run(self.service.counsellors.create(fields))
                .await?;
            Ok::<_, CapacityError>(CreatedCounsellor {
                id,
                name,
                email,
                max_capacity,
            })
        }
        .await;
        match result {
            Ok(created) => ApiResponse::ok(201, "Counsellor created successfully", created),
            Err(e) => e.into(),
        }
    }

    /// Update a counsellor from a JSON body.
    pub async fn update_counsellor(
        &self,
        ctx: &RequestContext,
        body: &str,
    ) -> ApiResponse<CounsellorRef> {
        let result = async {
            let update: CounsellorUpdate = parse_body(body)?;
            let counsellor_id = update.id;
            self.scoped(ctx)
                .run(self.service.counsellors.update(update))
                .await?;
            Ok::<_, CapacityError>(CounsellorRef { counsellor_id })
        }
        .await;
        match result {
            Ok(r) => ApiResponse::ok(200, "Counsellor updated successfully", r),
            Err(e) => e.into(),
        }
    }

    /// Delete an idle counsellor by query-string id.
    pub async fn delete_counsellor(
        &self,
        ctx: &RequestContext,
        raw_id: &str,
    ) -> ApiResponse<CounsellorRef> {
        let result = async {
            let counsellor_id = parse_id(raw_id, "counsellor")?;
            self.scoped(ctx)
                .run(self.service.counsellors.delete(counsellor_id))
                .await?;
            Ok::<_, CapacityError>(CounsellorRef { counsellor_id })
        }
        .await;
        match result {
            Ok(r) => ApiResponse::ok(200, "Counsellor deleted successfully", r),
            Err(e) => e.into(),
        }
    }

    /// Assign a lead to a counsellor from a JSON body.
    pub async fn assign_lead(&self, ctx: &RequestContext, body: &str) -> ApiResponse<AssignmentResult> {
        let result = async {
            let req: AssignLeadRequest = parse_body(body)?;
            self.service
                .coordinator
                .assign(&self.scoped(ctx), req.lead_id, req.counsellor_id)
                .await
        }
        .await;
        match result {
            Ok(AssignmentOutcome::Assigned {
                lead_id,
                counsellor_id,
                previous_counsellor_id,
            }) => ApiResponse::ok(
                200,
                "Lead assigned successfully",
                AssignmentResult {
                    lead_id,
                    counsellor_id,
                    previous_counsellor_id,
                },
            ),
            Ok(AssignmentOutcome::AlreadyAssigned {
                lead_id,
                counsellor_id,
            }) => ApiResponse::ok(
                200,
                "Lead already assigned to this counsellor",
                AssignmentResult {
                    lead_id,
                    counsellor_id,
                    previous_counsellor_id: None,
                },
            ),
            Err(e) => e.into(),
        }
    }

    /// Detach a lead from its counsellor from a JSON body.
    pub async fn unassign_lead(&self, ctx: &RequestContext, body: &str) -> ApiResponse<Release> {
        let result = async {
            let req: UnassignLeadRequest = parse_body(body)?;
            self.service
                .coordinator
                .unassign(&self.scoped(ctx), req.lead_id)
                .await
        }
        .await;
        match result {
            Ok(release) => ApiResponse::ok(200, "Lead unassigned successfully", release),
            Err(e) => e.into(),
        }
    }

    /// Register an unassigned lead from a JSON body.
    pub async fn create_lead(&self, ctx: &RequestContext, body: &str) -> ApiResponse<LeadRef> {
        let result = async {
            let lead: NewLead = parse_body(body)?;
            let lead_id = self.scoped(ctx).run(self.service.leads.create(lead)).await?;
            Ok::<_, CapacityError>(LeadRef { lead_id })
        }
        .await;
        match result {
            Ok(r) => ApiResponse::ok(201, "Lead created successfully", r),
            Err(e) => e.into(),
        }
    }

    /// Delete a lead by query-string id, releasing its counsellor's slot.
    pub async fn remove_lead(&self, ctx: &RequestContext, raw_id: &str) -> ApiResponse<Release> {
        let result = async {
            let lead_id = parse_id(raw_id, "lead")?;
            self.service
                .coordinator
                .remove_lead(&self.scoped(ctx), lead_id)
                .await
        }
        .await;
        match result {
            Ok(release) => ApiResponse::ok(200, "Lead removed successfully", release),
            Err(e) => e.into(),
        }
    }
}

fn remap<T, U>(resp: ApiResponse<T>, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
    ApiResponse {
        status: resp.status,
        success: resp.success,
        message: resp.message,
        data: resp.data.map(f),
    }
}
