use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// 邮件通知客户端。
/// 账本事务提交之后才允许调用; 失败只记日志, 绝不回滚账本。
#[derive(Clone)]
pub struct EmailNotifier {
    client: Client,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> AppResult<()> {
        if !self.config.enabled {
            log::debug!("Email disabled, skipping notification to {to}");
            return Ok(());
        }

        let body = SendEmailRequest {
            from: &self.config.from_address,
            to,
            subject,
            text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(AppError::ExternalApiError(format!(
                "Mail API returned {status}: {detail}"
            )))
        }
    }

    /// 发券成功通知 (即发即忘, 由调用方 spawn)
    pub async fn notify_ticket_issued(&self, to: &str, confirmation_code: &str) {
        let text = format!(
            "You earned a new lottery ticket! Confirmation code: {confirmation_code}. \
             Apply it to this week's draw to participate."
        );
        if let Err(e) = self.send(to, "You earned a lottery ticket", &text).await {
            log::error!("Failed to send ticket-issued email to {to}: {e}");
        }
    }

    /// 投入成功通知
    pub async fn notify_tickets_applied(&self, to: &str, applied: i64) {
        let text = format!("{applied} ticket(s) were applied to this week's draw. Good luck!");
        if let Err(e) = self.send(to, "Tickets applied to the draw", &text).await {
            log::error!("Failed to send tickets-applied email to {to}: {e}");
        }
    }

    /// 中奖通知
    pub async fn notify_winner(&self, to: &str, prize_paise: i64) {
        let text = format!(
            "Congratulations! You won this week's draw. Prize: ₹{}.{:02}. \
             Our team will contact you with the redemption code.",
            prize_paise / 100,
            prize_paise % 100
        );
        if let Err(e) = self.send(to, "You won the weekly draw!", &text).await {
            log::error!("Failed to send winner email to {to}: {e}");
        }
    }
}
