use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A printable settlement slip, captured at the moment of sale.
///
/// Prices on the slip come from the order lines, not the live menu, so a
/// later menu edit never changes what an already-issued slip says.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub order_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub status: String,
    pub lines: Vec<ReceiptLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl Receipt {
    /// Plain-text rendering for terminal printers and logs.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("========== ORDER SLIP ==========\n");
        out.push_str(&format!("Slip ID : {}\n", self.order_id));
        out.push_str(&format!(
            "Date    : {}\n",
            self.issued_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("Status  : {}\n", self.status));
        out.push_str("--------------------------------\n");
        for line in &self.lines {
            out.push_str(&format!(
                "{:<16} x{:<3} {:>10}\n",
                truncate(&line.name, 16),
                line.quantity,
                line.line_total
            ));
        }
        out.push_str("--------------------------------\n");
        out.push_str(&format!("TOTAL   : {}\n", self.total));
        out.push_str("          Thank you!\n");
        out.push_str("================================\n");
        out
    }

    /// Monospace HTML slip for the print dialog.
    pub fn render_html(&self) -> String {
        let mut rows = String::new();
        for line in &self.lines {
            rows.push_str(&format!(
                "<tr><td>{}</td><td style=\"text-align:center\">x{}</td>\
                 <td style=\"text-align:right\">{}</td>\
                 <td style=\"text-align:right\">{}</td></tr>",
                escape(&line.name),
                line.quantity,
                line.unit_price,
                line.line_total
            ));
        }
        format!(
            "<html><head><title>Order Slip</title></head>\
             <body style=\"font-family:monospace;width:280px;margin:0 auto\">\
             <h3 style=\"text-align:center\">ORDER SLIP</h3>\
             <p>Slip ID: {}<br/>Date: {}<br/>Status: {}</p>\
             <hr/><table style=\"width:100%\">{}</table><hr/>\
             <p style=\"text-align:right\"><strong>TOTAL: {}</strong></p>\
             <p style=\"text-align:center\">Thank you!</p>\
             </body></html>",
            self.order_id,
            self.issued_at.format("%Y-%m-%d %H:%M:%S"),
            self.status,
            rows,
            self.total
        )
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Receipt {
        Receipt {
            order_id: Uuid::nil(),
            issued_at: DateTime::parse_from_rfc3339("2024-06-01T12:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            status: "PENDING".to_string(),
            lines: vec![
                ReceiptLine {
                    name: "Iced Latte".to_string(),
                    quantity: 2,
                    unit_price: dec!(4.50),
                    line_total: dec!(9.00),
                },
                ReceiptLine {
                    name: "Croissant".to_string(),
                    quantity: 1,
                    unit_price: dec!(3.25),
                    line_total: dec!(3.25),
                },
            ],
            total: dec!(12.25),
        }
    }

    #[test]
    fn text_slip_contains_header_lines_and_total() {
        let text = sample().render_text();
        assert!(text.contains("ORDER SLIP"));
        assert!(text.contains("Slip ID : 00000000-0000-0000-0000-000000000000"));
        assert!(text.contains("Iced Latte"));
        assert!(text.contains("Croissant"));
        assert!(text.contains("TOTAL   : 12.25"));
        assert!(text.contains("Thank you!"));
    }

    #[test]
    fn html_slip_escapes_markup_in_names() {
        let mut receipt = sample();
        receipt.lines[0].name = "Fish & <Chips>".to_string();
        let html = receipt.render_html();
        assert!(html.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(!html.contains("<Chips>"));
    }

    #[test]
    fn long_names_are_truncated_in_text_slip() {
        let mut receipt = sample();
        receipt.lines[0].name = "An Extremely Long Menu Item Name".to_string();
        let text = receipt.render_text();
        assert!(text.contains("An Extremely Lon"));
        assert!(!text.contains("An Extremely Long"));
    }
}
