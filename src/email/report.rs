//! Daily usage report and test email.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::{EmailMessage, Mailer};
use crate::settings::EmailSettings;
use crate::users::stats::{GPT_COST_PER_REQUEST, TOTAL_COST_PER_REQUEST, WHISPER_COST_PER_REQUEST};
use crate::users::{OverallStats, User};

const STYLE: &str = "body{font-family:'Segoe UI',Tahoma,sans-serif;line-height:1.6;color:#333;margin:0;background:#f5f5f5}\
.container{max-width:800px;margin:0 auto;background:#fff}\
.header{background:linear-gradient(135deg,#667eea 0%,#764ba2 100%);color:#fff;padding:30px;text-align:center}\
.content{padding:30px}.section{margin-bottom:30px}\
.section h2{color:#4a5568;border-bottom:2px solid #e2e8f0;padding-bottom:10px}\
.stat-item{display:inline-block;background:#f7fafc;border:1px solid #e2e8f0;border-radius:8px;padding:20px;margin:8px;text-align:center;min-width:180px}\
.stat-number{font-size:2em;font-weight:bold;color:#4299e1}.stat-sub{font-size:.9em;color:#718096}\
table{width:100%;border-collapse:collapse}th,td{padding:12px;text-align:left;border-bottom:1px solid #e2e8f0}\
.cost-item{padding:8px 0;border-bottom:1px solid #e2e8f0}.total{font-weight:bold}\
.note{font-size:.9em;color:#718096}\
.alert{background:#fed7d7;border:1px solid #fc8181;color:#742a2a;padding:15px;border-radius:5px}\
.success{background:#c6f6d5;border:1px solid #68d391;color:#22543d;padding:15px;border-radius:5px}\
.footer{text-align:center;color:#718096;font-size:12px;padding:20px;background:#f7fafc}";

/// Escape text for inclusion in HTML.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, subtitle: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{STYLE}</style></head><body>\
         <div class=\"container\"><div class=\"header\"><h1>{title}</h1><p>{subtitle}</p></div>\
         <div class=\"content\">{body}</div>\
         <div class=\"footer\"><p>このメールは AI テロップ作成ツールの管理システムから送信されています。<br>\
         設定変更は管理画面の「メール通知設定」から行えます。</p></div></div></body></html>"
    )
}

fn local_date(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y/%-m/%-d").to_string()
}

fn local_datetime(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y/%-m/%-d %-H:%M:%S").to_string()
}

/// Test message confirming the mail setup works.
pub fn test_email(address: &str, sent_at: DateTime<FixedOffset>) -> EmailMessage {
    let body = format!(
        "<div class=\"success\"><strong>✅ テスト送信成功！</strong><br>\
         メール通知システムが正常に動作しています。</div>\
         <h2>📋 設定確認</h2><ul>\
         <li><strong>送信先:</strong> {}</li>\
         <li><strong>送信日時:</strong> {}</li>\
         <li><strong>システム状態:</strong> 正常稼働中</li></ul>\
         <p>日次レポートでは、総ユーザー数とアクティブユーザー数、リクエスト統計、\
         推定API利用コスト、ユーザー別の活動状況をお届けします。</p>",
        escape(address),
        local_datetime(&sent_at)
    );
    EmailMessage {
        to: address.to_string(),
        subject: "🧪 [AI テロップツール] メール通知テスト".to_string(),
        html: page("🧪 メール通知テスト", "AI テロップ作成ツール", &body),
    }
}

fn stats_section(stats: &OverallStats) -> String {
    format!(
        "<div class=\"section\"><h2>📊 全体統計</h2>\
         <div class=\"stat-item\"><div class=\"stat-number\">{}</div><div>総ユーザー数</div>\
         <div class=\"stat-sub\">アクティブ: {}</div></div>\
         <div class=\"stat-item\"><div class=\"stat-number\">{}</div><div>今日のリクエスト</div>\
         <div class=\"stat-sub\">今月: {}</div></div>\
         <div class=\"stat-item\"><div class=\"stat-number\">${:.2}</div><div>今日の推定コスト</div>\
         <div class=\"stat-sub\">累計: ${:.2}</div></div></div>",
        stats.total_users,
        stats.active_users,
        stats.total_daily_requests,
        stats.total_monthly_requests,
        stats.daily_cost(),
        stats.estimated_cost
    )
}

fn activity_section(users: &[User]) -> String {
    let active_today: Vec<&User> = users.iter().filter(|u| u.usage.daily_requests > 0).collect();
    let rows: String = active_today
        .iter()
        .map(|u| {
            format!(
                "<tr><td><strong>{}</strong> ({})</td><td>{} requests</td><td>{} requests</td><td>{}/{}</td></tr>",
                escape(&u.name),
                escape(&u.id),
                u.usage.daily_requests,
                u.usage.monthly_requests,
                u.usage.monthly_credits_used,
                u.limits.monthly_credits
            )
        })
        .collect();
    format!(
        "<div class=\"section\"><h2>👥 ユーザー別活動状況</h2>\
         <p><strong>今日アクティブなユーザー:</strong> {}名</p>\
         <table><thead><tr><th>ユーザー</th><th>今日の使用</th><th>月間使用</th><th>クレジット消費</th></tr></thead>\
         <tbody>{}</tbody></table></div>",
        active_today.len(),
        rows
    )
}

fn cost_section(stats: &OverallStats) -> String {
    let requests = stats.total_daily_requests as f64;
    format!(
        "<div class=\"section\"><h2>💰 コスト内訳（今日）</h2>\
         <div class=\"cost-item\">Whisper API (音声認識): ${:.3}</div>\
         <div class=\"cost-item\">GPT API (テキスト生成): ${:.3}</div>\
         <div class=\"cost-item total\">合計: ${:.3}</div>\
         <p class=\"note\">※ 推定値です。実際の請求額とは異なる場合があります。</p></div>",
        requests * WHISPER_COST_PER_REQUEST,
        requests * GPT_COST_PER_REQUEST,
        requests * TOTAL_COST_PER_REQUEST
    )
}

/// Subject and HTML body of the daily report. Sections follow the
/// inclusion flags in `settings`.
pub fn daily_report(
    settings: &EmailSettings,
    users: &[User],
    stats: &OverallStats,
    generated_at: DateTime<FixedOffset>,
) -> (String, String) {
    let date = local_date(&generated_at);

    let mut body = if stats.total_daily_requests > 0 {
        format!(
            "<div class=\"success\">✅ 本日もシステムが正常に稼働し、{}件のリクエストを処理しました。</div>",
            stats.total_daily_requests
        )
    } else {
        "<div class=\"alert\">ℹ️ 本日はまだリクエストが処理されていません。</div>".to_string()
    };

    if settings.include_stats {
        body.push_str(&stats_section(stats));
    }
    if settings.include_user_activity {
        body.push_str(&activity_section(users));
    }
    if settings.include_cost_breakdown {
        body.push_str(&cost_section(stats));
    }
    body.push_str(&format!(
        "<div class=\"section\"><h2>🔧 システム情報</h2><ul>\
         <li><strong>レポート生成時刻:</strong> {}</li>\
         <li><strong>設定送信時刻:</strong> {}</li>\
         <li><strong>システム状態:</strong> 正常稼働中</li></ul></div>",
        local_datetime(&generated_at),
        escape(&settings.send_time)
    ));

    let subject = format!("📊 [AI テロップツール] 日次利用状況レポート - {}", date);
    let html = page(
        "📊 日次利用状況レポート",
        &format!("AI テロップ作成ツール - {}", date),
        &body,
    );
    (subject, html)
}

/// Delivery outcome for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendResult {
    pub email: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tally of a batch send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendSummary {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub results: Vec<SendResult>,
}

/// Send the same report to every address, one message each. Failures are
/// collected, not propagated.
pub async fn send_to_all(
    mailer: &dyn Mailer,
    addresses: &[String],
    subject: &str,
    html: &str,
) -> SendSummary {
    let mut results = Vec::with_capacity(addresses.len());
    for address in addresses {
        let message = EmailMessage {
            to: address.clone(),
            subject: subject.to_string(),
            html: html.to_string(),
        };
        match mailer.send(&message).await {
            Ok(()) => results.push(SendResult {
                email: address.clone(),
                success: true,
                error: None,
            }),
            Err(e) => {
                tracing::error!(to = %address, error = %e, "report delivery failed");
                results.push(SendResult {
                    email: address.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let success = results.iter().filter(|r| r.success).count();
    SendSummary {
        total: results.len(),
        success,
        failure: results.len() - success,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MemoryMailer;
    use crate::users::seed::default_users;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 5, 10, 9, 1, 0)
            .unwrap()
    }

    fn users_with_activity() -> Vec<User> {
        let mut users = default_users();
        users[1].usage.daily_requests = 3;
        users[1].usage.total_requests = 3;
        users[1].name = "<script>".to_string();
        users
    }

    #[test]
    fn test_report_sections_follow_flags() {
        let users = users_with_activity();
        let stats = OverallStats::from_users(&users);

        let all = EmailSettings::default();
        let (subject, html) = daily_report(&all, &users, &stats, generated_at());
        assert!(subject.ends_with("2025/5/10"));
        assert!(html.contains("全体統計"));
        assert!(html.contains("ユーザー別活動状況"));
        assert!(html.contains("コスト内訳"));
        assert!(html.contains("3件のリクエスト"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));

        let none = EmailSettings {
            include_stats: false,
            include_user_activity: false,
            include_cost_breakdown: false,
            ..EmailSettings::default()
        };
        let (_, html) = daily_report(&none, &users, &stats, generated_at());
        assert!(!html.contains("全体統計"));
        assert!(!html.contains("ユーザー別活動状況"));
        assert!(!html.contains("コスト内訳"));
        assert!(html.contains("システム情報"));
    }

    #[test]
    fn test_idle_day_banner() {
        let users = default_users();
        let stats = OverallStats::from_users(&users);
        let (_, html) = daily_report(&EmailSettings::default(), &users, &stats, generated_at());
        assert!(html.contains("本日はまだリクエストが処理されていません"));
    }

    #[test]
    fn test_test_email() {
        let message = test_email("ops@example.com", generated_at());
        assert_eq!(message.to, "ops@example.com");
        assert!(message.subject.contains("メール通知テスト"));
        assert!(message.html.contains("2025/5/10 9:01:00"));
    }

    #[tokio::test]
    async fn test_send_to_all_tallies() {
        let mailer = MemoryMailer::new();
        mailer.fail_for("b@example.com");
        let addresses = vec![
            "a@example.com".to_string(),
            "b@example.com".to_string(),
            "c@example.com".to_string(),
        ];

        let summary = send_to_all(&mailer, &addresses, "s", "<p>h</p>").await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 1);
        assert!(!summary.results[1].success);
        assert!(summary.results[1].error.is_some());
        assert_eq!(mailer.sent().len(), 2);
    }
}
