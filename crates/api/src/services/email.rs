//! Transactional and newsletter email.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.
//! Storefront notifications are fire-and-forget: [`EmailService::notify`]
//! spawns the send and logs failures at WARN, so a mail outage never fails a
//! request. The admin broadcast awaits each send and counts failures.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use mindy_munchs_core::{Email, OrderStatus, PaymentMethod, Price};

use crate::config::EmailConfig;
use crate::models::Order;

/// A line in the order confirmation table, pre-formatted for display.
struct LineView {
    name: String,
    quantity: i32,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: String,
    lines: &'a [LineView],
    subtotal: String,
    shipping_fee: String,
    total: String,
    payment_label: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: String,
    lines: &'a [LineView],
    subtotal: String,
    shipping_fee: String,
    total: String,
    payment_label: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    name: &'a str,
    order_id: String,
    headline: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    name: &'a str,
    order_id: String,
    headline: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/newsletter_welcome.html")]
struct NewsletterWelcomeHtml<'a> {
    greeting: &'a str,
    shop_url: &'a str,
    unsubscribe_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/newsletter_welcome.txt")]
struct NewsletterWelcomeText<'a> {
    greeting: &'a str,
    shop_url: &'a str,
    unsubscribe_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/newsletter_broadcast.html")]
struct NewsletterBroadcastHtml<'a> {
    subject: &'a str,
    paragraphs: &'a [&'a str],
    unsubscribe_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/newsletter_broadcast.txt")]
struct NewsletterBroadcastText<'a> {
    body: &'a str,
    unsubscribe_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A storefront notification, owning everything it needs to render.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Sent after registration.
    Welcome { to: Email, name: String },
    /// Sent when an order is confirmed (COD placement or payment capture).
    OrderConfirmation { to: Email, name: String, order: Order },
    /// Sent when an admin changes an order's status.
    OrderStatus { to: Email, name: String, order: Order },
    /// Sent for a new or re-activated newsletter subscription.
    NewsletterWelcome { to: Email, name: Option<String> },
}

impl Notification {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::OrderConfirmation { .. } => "order_confirmation",
            Self::OrderStatus { .. } => "order_status",
            Self::NewsletterWelcome { .. } => "newsletter_welcome",
        }
    }

    const fn recipient(&self) -> &Email {
        match self {
            Self::Welcome { to, .. }
            | Self::OrderConfirmation { to, .. }
            | Self::OrderStatus { to, .. }
            | Self::NewsletterWelcome { to, .. } => to,
        }
    }
}

/// A rendered message ready for the transport.
#[derive(Debug)]
struct Rendered {
    subject: String,
    text: String,
    html: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    frontend_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, frontend_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            frontend_url: frontend_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Send a notification in the background.
    ///
    /// With no email service configured the notification is logged and
    /// dropped.
    pub fn notify(service: Option<&Self>, notification: Notification) {
        let Some(service) = service.cloned() else {
            tracing::debug!(
                kind = notification.kind(),
                to = %notification.recipient(),
                "Email not configured, skipping notification"
            );
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = service.deliver(&notification).await {
                tracing::warn!(
                    error = %e,
                    kind = notification.kind(),
                    to = %notification.recipient(),
                    "Failed to send notification email"
                );
            }
        });
    }

    /// Render and send a notification, returning any failure.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn deliver(&self, notification: &Notification) -> Result<(), EmailError> {
        let rendered = render_notification(&self.frontend_url, notification)?;
        self.send_multipart_email(
            notification.recipient().as_str(),
            &rendered.subject,
            &rendered.text,
            &rendered.html,
        )
        .await
    }

    /// Send one newsletter issue to one subscriber.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_newsletter(
        &self,
        to: &Email,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        let rendered = render_broadcast(&self.frontend_url, to, subject, body)?;
        self.send_multipart_email(to.as_str(), &rendered.subject, &rendered.text, &rendered.html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn money(amount: rust_decimal::Decimal) -> String {
    Price::inr(amount).display()
}

const fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "Cash on delivery",
        PaymentMethod::Online => "Paid online",
    }
}

const fn status_headline(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "has been received",
        OrderStatus::Processing => "is being prepared",
        OrderStatus::Shipped => "is on its way",
        OrderStatus::Delivered => "has been delivered",
        OrderStatus::Cancelled => "has been cancelled",
    }
}

fn unsubscribe_url(frontend_url: &str, email: &Email) -> String {
    match url::Url::parse(&format!("{frontend_url}/newsletter/unsubscribe")) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("email", email.as_str());
            url.into()
        }
        Err(_) => format!("{frontend_url}/newsletter/unsubscribe"),
    }
}

fn render_notification(
    frontend_url: &str,
    notification: &Notification,
) -> Result<Rendered, EmailError> {
    match notification {
        Notification::Welcome { name, .. } => {
            let shop_url = format!("{frontend_url}/shop");
            Ok(Rendered {
                subject: "Welcome to Mindy Munchs".to_string(),
                text: WelcomeEmailText {
                    name,
                    shop_url: &shop_url,
                }
                .render()?,
                html: WelcomeEmailHtml {
                    name,
                    shop_url: &shop_url,
                }
                .render()?,
            })
        }
        Notification::OrderConfirmation { name, order, .. } => {
            let order_url = format!("{frontend_url}/orders/{}", order.id);
            let lines: Vec<LineView> = order
                .items
                .iter()
                .map(|item| LineView {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    line_total: money(item.line_total),
                })
                .collect();
            let payment_label = payment_label(order.payment_method);

            Ok(Rendered {
                subject: format!("Your Mindy Munchs order #{} is confirmed", order.id),
                text: OrderConfirmationText {
                    name,
                    order_id: order.id.to_string(),
                    lines: &lines,
                    subtotal: money(order.subtotal),
                    shipping_fee: money(order.shipping_fee),
                    total: money(order.total),
                    payment_label,
                    order_url: &order_url,
                }
                .render()?,
                html: OrderConfirmationHtml {
                    name,
                    order_id: order.id.to_string(),
                    lines: &lines,
                    subtotal: money(order.subtotal),
                    shipping_fee: money(order.shipping_fee),
                    total: money(order.total),
                    payment_label,
                    order_url: &order_url,
                }
                .render()?,
            })
        }
        Notification::OrderStatus { name, order, .. } => {
            let order_url = format!("{frontend_url}/orders/{}", order.id);
            let headline = status_headline(order.status);

            Ok(Rendered {
                subject: format!("Your Mindy Munchs order #{} {headline}", order.id),
                text: OrderStatusText {
                    name,
                    order_id: order.id.to_string(),
                    headline,
                    order_url: &order_url,
                }
                .render()?,
                html: OrderStatusHtml {
                    name,
                    order_id: order.id.to_string(),
                    headline,
                    order_url: &order_url,
                }
                .render()?,
            })
        }
        Notification::NewsletterWelcome { to, name } => {
            let greeting = name
                .as_deref()
                .map_or_else(|| "Hi there".to_string(), |n| format!("Hi {n}"));
            let shop_url = format!("{frontend_url}/shop");
            let unsubscribe_url = unsubscribe_url(frontend_url, to);

            Ok(Rendered {
                subject: "You're on the Mindy Munchs list".to_string(),
                text: NewsletterWelcomeText {
                    greeting: &greeting,
                    shop_url: &shop_url,
                    unsubscribe_url: &unsubscribe_url,
                }
                .render()?,
                html: NewsletterWelcomeHtml {
                    greeting: &greeting,
                    shop_url: &shop_url,
                    unsubscribe_url: &unsubscribe_url,
                }
                .render()?,
            })
        }
    }
}

fn render_broadcast(
    frontend_url: &str,
    to: &Email,
    subject: &str,
    body: &str,
) -> Result<Rendered, EmailError> {
    let unsubscribe_url = unsubscribe_url(frontend_url, to);
    let paragraphs: Vec<&str> = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    Ok(Rendered {
        subject: subject.to_string(),
        text: NewsletterBroadcastText {
            body,
            unsubscribe_url: &unsubscribe_url,
        }
        .render()?,
        html: NewsletterBroadcastHtml {
            subject,
            paragraphs: &paragraphs,
            unsubscribe_url: &unsubscribe_url,
        }
        .render()?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use mindy_munchs_core::{OrderId, OrderItemId, PaymentStatus, ProductId, UserId};

    use super::*;
    use crate::models::{OrderItem, ShippingAddress};

    const FRONTEND: &str = "https://mindymunchs.com";

    fn email() -> Email {
        Email::parse("priya@example.com").unwrap()
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(42),
            user_id: UserId::new(7),
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            shipping_address: ShippingAddress {
                full_name: "Priya Nair".to_string(),
                phone: "9876543210".to_string(),
                line1: "4 MG Road".to_string(),
                line2: None,
                city: "Kochi".to_string(),
                state: "Kerala".to_string(),
                pincode: "682001".to_string(),
            },
            subtotal: Decimal::new(398, 0),
            shipping_fee: Decimal::new(49, 0),
            total: Decimal::new(447, 0),
            gateway_order_id: None,
            gateway_payment_id: None,
            notes: None,
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                product_id: ProductId::new(3),
                name: "Ragi Cookies".to_string(),
                unit_price: Decimal::new(199, 0),
                quantity: 2,
                line_total: Decimal::new(398, 0),
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_welcome_email_renders() {
        let rendered = render_notification(
            FRONTEND,
            &Notification::Welcome {
                to: email(),
                name: "Priya".to_string(),
            },
        )
        .unwrap();
        assert_eq!(rendered.subject, "Welcome to Mindy Munchs");
        assert!(rendered.text.contains("Priya"));
        assert!(rendered.text.contains("https://mindymunchs.com/shop"));
    }

    #[test]
    fn test_order_confirmation_lists_items_and_totals() {
        let rendered = render_notification(
            FRONTEND,
            &Notification::OrderConfirmation {
                to: email(),
                name: "Priya".to_string(),
                order: order(OrderStatus::Pending),
            },
        )
        .unwrap();
        assert!(rendered.subject.contains("#42"));
        assert!(rendered.text.contains("Ragi Cookies"));
        assert!(rendered.text.contains("₹447.00"));
        assert!(rendered.html.contains("Cash on delivery"));
    }

    #[test]
    fn test_order_status_headline() {
        let rendered = render_notification(
            FRONTEND,
            &Notification::OrderStatus {
                to: email(),
                name: "Priya".to_string(),
                order: order(OrderStatus::Shipped),
            },
        )
        .unwrap();
        assert_eq!(rendered.subject, "Your Mindy Munchs order #42 is on its way");
    }

    #[test]
    fn test_html_escapes_user_content() {
        let rendered = render_notification(
            FRONTEND,
            &Notification::Welcome {
                to: email(),
                name: "<script>".to_string(),
            },
        )
        .unwrap();
        assert!(!rendered.html.contains("<script>"));
    }

    #[test]
    fn test_newsletter_welcome_greeting() {
        let rendered = render_notification(
            FRONTEND,
            &Notification::NewsletterWelcome {
                to: email(),
                name: None,
            },
        )
        .unwrap();
        assert!(rendered.text.contains("Hi there"));
        assert!(rendered.text.contains("email=priya%40example.com"));
    }

    #[test]
    fn test_broadcast_splits_paragraphs() {
        let rendered = render_broadcast(
            FRONTEND,
            &email(),
            "Diwali specials",
            "New laddoos are here.\n\nOrder before Friday.",
        )
        .unwrap();
        assert_eq!(rendered.subject, "Diwali specials");
        assert_eq!(rendered.html.matches("<p class=\"body\">").count(), 2);
        assert!(rendered.text.contains("Order before Friday."));
    }

    #[test]
    fn test_unsubscribe_url_encodes_email() {
        let email = Email::parse("a+b@example.com").unwrap();
        assert_eq!(
            unsubscribe_url(FRONTEND, &email),
            "https://mindymunchs.com/newsletter/unsubscribe?email=a%2Bb%40example.com"
        );
    }
}
