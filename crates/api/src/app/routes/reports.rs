use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};

use eafoods_auth::Permission;
use eafoods_infra::{Services, Store};
use eafoods_reporting::ReportPolicy;

use crate::app::routes::common::{guard, CmdAuth};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub const DEFAULT_REPORT_DAYS: i64 = 7;
pub const DEFAULT_REPORT_LIMIT: usize = 10;

pub async fn top_products<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TopProductsQuery>,
) -> axum::response::Response {
    let query = match guard(&principal, CmdAuth::new(query, Permission::REPORTS_READ)) {
        Ok(q) => q,
        Err(res) => return res,
    };

    let now = Utc::now();
    let since = query
        .since
        .unwrap_or_else(|| now - Duration::days(DEFAULT_REPORT_DAYS));
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT);
    let policy = query.include_pending.map(|pending| {
        if pending {
            ReportPolicy::ConfirmedAndPending
        } else {
            ReportPolicy::ConfirmedOnly
        }
    });

    match services
        .reports
        .top_selling_products(since, now, limit, policy)
        .await
    {
        Ok(rows) => {
            let items = rows.iter().map(dto::top_product_to_json).collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "since": since,
                    "until": now,
                    "policy": policy.unwrap_or(services.reports.policy()),
                    "items": items,
                })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
