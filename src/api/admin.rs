//! Administrator endpoints: user management, email report settings and
//! delivery, and the scheduled report trigger.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{bearer_token, AdminAccess, AppState};
use crate::email::report::{self, SendSummary};
use crate::email::schedule::{self, CronDecision};
use crate::error::{ApiError, ApiResult};
use crate::settings::{is_valid_email, EmailSettings};
use crate::users::{NewUser, OverallStats, UserUpdates, UserView};

pub(crate) async fn list_users(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let users = state.users.all_users().await?;
    let stats = OverallStats::from_users(&users);
    let views: Vec<UserView> = users.iter().map(UserView::from).collect();
    Ok(Json(json!({ "success": true, "users": views, "stats": stats })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserBody {
    action: String,
    user: Option<NewUser>,
}

pub(crate) async fn create_user(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> ApiResult<Json<Value>> {
    if body.action != "create" {
        return Err(ApiError::bad_request("Invalid action"));
    }
    let Some(new_user) = body.user else {
        return Err(ApiError::bad_request("user is required"));
    };
    let user = state.users.create_user(new_user).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, "user created");
    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateUserBody {
    action: String,
    user_id: String,
    #[serde(default)]
    updates: UserUpdates,
    new_id: Option<String>,
}

/// `toggleActive`, `update` (password, name, limits) and `changeId`.
pub(crate) async fn update_user(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Json(body): Json<UpdateUserBody>,
) -> ApiResult<Json<Value>> {
    match body.action.as_str() {
        "toggleActive" => {
            let active = state.users.toggle_active(&body.user_id).await?;
            tracing::info!(user_id = %body.user_id, active, "user active flag toggled");
            Ok(Json(json!({ "success": true, "active": active })))
        }
        "update" => {
            state.users.apply_updates(&body.user_id, body.updates).await?;
            tracing::info!(user_id = %body.user_id, "user updated");
            Ok(Json(json!({ "success": true })))
        }
        "changeId" => {
            let Some(new_id) = body.new_id.filter(|id| !id.trim().is_empty()) else {
                return Err(ApiError::bad_request("newId is required"));
            };
            state.users.change_user_id(&body.user_id, new_id.trim()).await?;
            tracing::info!(from = %body.user_id, to = %new_id.trim(), "user id changed");
            Ok(Json(json!({ "success": true, "userId": new_id.trim() })))
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteUserBody {
    user_id: String,
}

pub(crate) async fn delete_user(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Json(body): Json<DeleteUserBody>,
) -> ApiResult<Json<Value>> {
    state.users.delete_user(&body.user_id).await?;
    tracing::info!(user_id = %body.user_id, "user deleted");
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn get_email_settings(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Json<Value> {
    let settings = state.email_settings.load().await;
    Json(json!({ "success": true, "settings": settings }))
}

pub(crate) async fn save_email_settings(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Json(settings): Json<EmailSettings>,
) -> ApiResult<Json<Value>> {
    let saved = state.email_settings.save(settings).await?;
    Ok(Json(json!({
        "success": true,
        "message": "メール通知設定を保存しました",
        "settings": saved,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestEmailBody {
    email_address: Option<String>,
}

pub(crate) async fn send_test_email(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Json(body): Json<TestEmailBody>,
) -> ApiResult<Json<Value>> {
    let Some(address) = body
        .email_address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
    else {
        return Err(ApiError::bad_request("メールアドレスが必要です"));
    };
    if !is_valid_email(&address) {
        return Err(ApiError::bad_request(format!(
            "有効なメールアドレス形式で入力してください: {}",
            address
        )));
    }

    let sent_at = state.clock.now().with_timezone(&state.config.report_offset);
    let message = report::test_email(&address, sent_at);
    state
        .mailer
        .send(&message)
        .await
        .map_err(|e| ApiError::internal("テストメール送信に失敗しました", e))?;

    Ok(Json(json!({
        "success": true,
        "message": "テストメールを送信しました",
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportStats {
    total_users: usize,
    daily_requests: u64,
    estimated_cost: String,
}

#[derive(Debug, Serialize)]
struct ReportDelivery {
    summary: SendSummary,
    stats: ReportStats,
}

/// Compile today's report and send it to every configured address.
/// `lastSent` is stamped when at least one delivery succeeded.
async fn deliver_daily_report(state: &AppState) -> ApiResult<ReportDelivery> {
    let Some(settings) = state.email_settings.load_existing().await? else {
        return Err(ApiError::NotFound("メール設定が見つかりません".to_string()));
    };
    if !settings.enabled || settings.email_addresses.is_empty() {
        return Err(ApiError::bad_request(
            "メール通知が無効または送信先が設定されていません",
        ));
    }

    let users = state.users.all_users().await?;
    let stats = OverallStats::from_users(&users);
    let now = state.clock.now();
    let (subject, html) = report::daily_report(
        &settings,
        &users,
        &stats,
        now.with_timezone(&state.config.report_offset),
    );

    let summary =
        report::send_to_all(state.mailer.as_ref(), &settings.email_addresses, &subject, &html).await;
    if summary.success > 0 {
        state.email_settings.mark_sent(now).await?;
    }

    tracing::info!(
        total = summary.total,
        success = summary.success,
        failure = summary.failure,
        "daily report delivered"
    );
    Ok(ReportDelivery {
        summary,
        stats: ReportStats {
            total_users: stats.total_users,
            daily_requests: stats.total_daily_requests,
            estimated_cost: format!("{:.2}", stats.daily_cost()),
        },
    })
}

pub(crate) async fn send_daily_report(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let delivery = deliver_daily_report(&state).await?;
    let summary = &delivery.summary;
    Ok(Json(json!({
        "success": summary.success > 0,
        "message": format!("日次レポートを送信しました: {}/{}件成功", summary.success, summary.total),
        "details": summary,
        "stats": delivery.stats,
    })))
}

/// Scheduled trigger. Sends only within the window around the configured
/// time and at most once per local day.
pub(crate) async fn cron_daily_email(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    if bearer_token(&headers) != Some(state.config.cron_secret.as_str()) {
        return Err(ApiError::Unauthorized("認証が必要です".to_string()));
    }

    let settings = state.email_settings.load_existing().await?;
    let decision = schedule::decide(
        settings.as_ref(),
        state.clock.now(),
        state.config.report_offset,
    );
    tracing::info!(?decision, "cron tick");

    let reply = match decision {
        CronDecision::NotConfigured => {
            json!({ "success": false, "message": "メール設定が見つかりません" })
        }
        CronDecision::Disabled => json!({ "success": true, "message": "メール通知は無効です" }),
        CronDecision::OutsideWindow { current, target } => json!({
            "success": true,
            "message": format!("送信時刻ではありません。現在: {}, 設定: {}", current, target),
        }),
        CronDecision::AlreadySent => {
            json!({ "success": true, "message": "今日は既に送信済みです" })
        }
        CronDecision::Send => {
            let delivery = deliver_daily_report(&state).await?;
            if delivery.summary.success == 0 {
                return Err(ApiError::internal(
                    "日次レポートの送信に失敗しました",
                    format!("0/{} deliveries succeeded", delivery.summary.total),
                ));
            }
            json!({
                "success": true,
                "message": "日次レポートを送信しました",
                "stats": delivery.stats,
            })
        }
    };
    Ok(Json(reply))
}
