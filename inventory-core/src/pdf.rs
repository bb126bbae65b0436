//! Fixed-layout A4 documents for vouchers.

use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use rust_decimal::Decimal;
use std::io::BufWriter;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Company, Purchase, Sale};

/// Rendered document ready to be served as a download.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn sales_invoice_file_name(id: Uuid) -> String {
    format!("sales-invoice-{}.pdf", id)
}

pub fn purchase_order_file_name(id: Uuid) -> String {
    format!("purchase-order-{}.pdf", id)
}

/// One voucher line, shared by invoices and purchase orders.
struct VoucherLayout<'a> {
    title: &'a str,
    number: &'a str,
    party_label: &'a str,
    party: &'a str,
    date: NaiveDate,
    product_name: &'a str,
    quantity: Decimal,
    unit_price: Decimal,
    total: Decimal,
}

pub fn sales_invoice_pdf(sale: &Sale, company: Option<&Company>) -> AppResult<PdfFile> {
    let layout = VoucherLayout {
        title: "SALES INVOICE",
        number: &sale.invoice_number,
        party_label: "Bill to:",
        party: &sale.customer,
        date: sale.sale_date,
        product_name: &sale.product_name,
        quantity: sale.quantity,
        unit_price: sale.unit_price,
        total: sale.total,
    };
    let bytes = render(&layout, company)?;
    debug!(sale_id = %sale.id, size = bytes.len(), "Rendered sales invoice");

    Ok(PdfFile {
        file_name: sales_invoice_file_name(sale.id),
        bytes,
    })
}

pub fn purchase_order_pdf(purchase: &Purchase, company: Option<&Company>) -> AppResult<PdfFile> {
    let layout = VoucherLayout {
        title: "PURCHASE ORDER",
        number: &purchase.order_number,
        party_label: "Supplier:",
        party: &purchase.supplier,
        date: purchase.purchase_date,
        product_name: &purchase.product_name,
        quantity: purchase.quantity,
        unit_price: purchase.unit_price,
        total: purchase.total,
    };
    let bytes = render(&layout, company)?;
    debug!(purchase_id = %purchase.id, size = bytes.len(), "Rendered purchase order");

    Ok(PdfFile {
        file_name: purchase_order_file_name(purchase.id),
        bytes,
    })
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("PDF generation failed: {}", e))
}

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, value: &str, size: f32, x: f32, y: f32) {
    layer.use_text(value, size, Mm(x), Mm(y), font);
}

fn rule(layer: &PdfLayerReference, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(15.0), Mm(y)), false),
            (Point::new(Mm(195.0), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn render(layout: &VoucherLayout<'_>, company: Option<&Company>) -> AppResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(layout.title, Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page).get_layer(layer);

    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    // Company block, left
    let mut y: f32 = 285.0;
    match company {
        Some(company) => {
            text(&layer, &bold, &company.name, 16.0, 15.0, y);
            for line in [&company.address, &company.phone, &company.email]
                .into_iter()
                .flatten()
            {
                y -= 5.5;
                text(&layer, &font, line, 10.0, 15.0, y);
            }
        }
        None => text(&layer, &bold, "Inventory", 16.0, 15.0, y),
    }

    // Title, right
    text(&layer, &bold, layout.title, 18.0, 125.0, 285.0);
    text(&layer, &font, &format!("No. {}", layout.number), 11.0, 125.0, 277.0);
    text(&layer, &font, &format!("Date: {}", layout.date), 11.0, 125.0, 271.0);

    y = 260.0;
    rule(&layer, y);

    y -= 10.0;
    text(&layer, &bold, layout.party_label, 12.0, 15.0, y);
    y -= 6.0;
    text(&layer, &font, layout.party, 10.0, 15.0, y);

    // Line items
    y -= 14.0;
    let (x_desc, x_qty, x_unit, x_total) = (15.0, 110.0, 140.0, 172.0);
    text(&layer, &bold, "Description", 10.0, x_desc, y);
    text(&layer, &bold, "Qty", 10.0, x_qty, y);
    text(&layer, &bold, "Unit price", 10.0, x_unit, y);
    text(&layer, &bold, "Total", 10.0, x_total, y);
    y -= 3.5;
    rule(&layer, y);

    y -= 7.0;
    text(&layer, &font, layout.product_name, 10.0, x_desc, y);
    text(&layer, &font, &format_quantity(layout.quantity), 10.0, x_qty, y);
    text(&layer, &font, &format_money(layout.unit_price), 10.0, x_unit, y);
    text(&layer, &bold, &format_money(layout.total), 10.0, x_total, y);

    y -= 6.0;
    rule(&layer, y);

    y -= 10.0;
    text(&layer, &bold, "TOTAL:", 13.0, 140.0, y);
    text(&layer, &bold, &format_money(layout.total), 13.0, x_total, y);

    text(&layer, &font, "Generated by Inventory.", 9.0, 15.0, 12.0);

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(pdf_error)?;
    writer.into_inner().map_err(pdf_error)
}

fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Two decimals with thousands separators, e.g. `12,345.60`.
fn format_money(value: Decimal) -> String {
    let fixed = format!("{:.2}", value.round_dp(2));
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, dec_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}.{}", sign, grouped, dec_part)
}
