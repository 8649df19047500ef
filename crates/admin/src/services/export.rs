//! Spreadsheet exports: the courier order sheet and the income report.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use souq_core::ShippingStatus;

use crate::db::{ExportRow, IncomeProductRow, IncomeRow};

/// Download name of the full order export.
pub const ORDERS_FILENAME: &str = "الطلبات.xlsx";
/// Download name of the selected-orders export.
pub const SELECTED_ORDERS_FILENAME: &str = "الطلبات المحددة.xlsx";
/// Download name of the income report.
pub const INCOME_FILENAME: &str = "إحصائيات الدخل.xlsx";

/// Content type of `.xlsx` downloads.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Flat cost charged against every delivered or returned order.
const MANUFACTURING_COST: i64 = 20;

/// Per-unit production cost, matched on the exact product name.
const PRODUCTION_COSTS: &[(&str, i64)] = &[("زيت", 140), ("سبراي", 140), ("سيروم الرموش", 35)];

const ORDER_HEADERS: [&str; 10] = [
    "اسم العميل",
    "تليفون (محمول فقط)",
    "المدينة",
    "المنطقة",
    "العنوان",
    "قيمة التحصيل النقدي",
    "عدد القطع",
    "وصف الشحنة",
    "مرجع الطلب",
    "قيمة الشحنة",
];

const INCOME_HEADERS: [&str; 8] = [
    "اسم العميل",
    "تليفون (محمول فقط)",
    "قيمة التحصيل النقدي",
    "قيمه الشحن",
    "تكلفة التصنيع",
    "صافي",
    "الحالة",
    "التاريخ",
];

const PRODUCT_HEADERS: [&str; 5] = [
    "المنتج",
    "الكمية المباعة",
    "الإيرادات",
    "تكلفة الإنتاج",
    "صافي الربح",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// One order line of the income sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeLine {
    pub name: String,
    pub phone: String,
    pub cash: Decimal,
    pub shipping: Decimal,
    pub manufacturing: Decimal,
    pub net: Decimal,
    pub delivered: bool,
    pub date: String,
}

impl IncomeLine {
    #[must_use]
    pub const fn status_label(&self) -> &'static str {
        if self.delivered { "تم التوصيل" } else { "مرتجع" }
    }
}

/// Aggregated figures of one product over delivered orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIncome {
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
    pub cost: Decimal,
}

impl ProductIncome {
    #[must_use]
    pub fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }
}

/// The computed income report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomeReport {
    pub lines: Vec<IncomeLine>,
    pub delivered_count: usize,
    pub returned_count: usize,
    pub total_cash: Decimal,
    pub total_shipping: Decimal,
    pub total_manufacturing: Decimal,
    pub total_net: Decimal,
    pub products: Vec<ProductIncome>,
}

/// Unit production cost of a product, `0` when it has none on file.
#[must_use]
pub fn production_cost(name: &str) -> Decimal {
    PRODUCTION_COSTS
        .iter()
        .find(|(product, _)| *product == name)
        .map_or(Decimal::ZERO, |(_, cost)| Decimal::from(*cost))
}

/// Compute the income report from delivered and returned orders.
///
/// Returned orders collect nothing and still carry shipping and
/// manufacturing costs.
#[must_use]
pub fn income_report(orders: &[IncomeRow], products: &[IncomeProductRow]) -> IncomeReport {
    let manufacturing = Decimal::from(MANUFACTURING_COST);
    let mut report = IncomeReport::default();

    for order in orders {
        let delivered = order.shipping_status == ShippingStatus::Delivered;
        let cash = if delivered {
            order.cod_amount
        } else {
            Decimal::ZERO
        };
        let net = cash - order.shipping_price - manufacturing;
        if delivered {
            report.delivered_count += 1;
        } else {
            report.returned_count += 1;
        }
        report.total_cash += cash;
        report.total_shipping += order.shipping_price;
        report.total_manufacturing += manufacturing;
        report.total_net += net;
        report.lines.push(IncomeLine {
            name: order.name.clone(),
            phone: order.phone.clone(),
            cash,
            shipping: order.shipping_price,
            manufacturing,
            net,
            delivered,
            date: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        });
    }

    report.products = products
        .iter()
        .map(|row| {
            let quantity = Decimal::from(row.quantity);
            ProductIncome {
                name: row.name.clone(),
                quantity: row.quantity,
                revenue: quantity * row.price,
                cost: quantity * production_cost(&row.name),
            }
        })
        .collect();

    report
}

fn number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x00F2_F2F2))
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], format: Option<&Format>) -> Result<(), XlsxError> {
    for (col, header) in (0_u16..).zip(headers) {
        match format {
            Some(format) => sheet.write_string_with_format(0, col, *header, format)?,
            None => sheet.write_string(0, col, *header)?,
        };
        sheet.set_column_width(col, 18)?;
    }
    Ok(())
}

/// Build the courier order sheet.
///
/// # Errors
///
/// Returns `ExportError::Xlsx` if the workbook cannot be written.
pub fn orders_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("الطلبات")?;
    write_headers(sheet, &ORDER_HEADERS, None)?;

    for (row_num, row) in (1_u32..).zip(rows) {
        let cod = number(row.cod_amount);
        sheet.write_string(row_num, 0, &row.name)?;
        sheet.write_string(row_num, 1, &row.phone)?;
        sheet.write_string(row_num, 2, row.city_name.as_deref().unwrap_or("Unknown"))?;
        sheet.write_string(row_num, 3, &row.zone_id)?;
        sheet.write_string(row_num, 4, &row.address)?;
        sheet.write_number(row_num, 5, cod)?;
        #[allow(clippy::cast_precision_loss)]
        let pieces = row.pieces as f64;
        sheet.write_number(row_num, 6, pieces)?;
        sheet.write_string(row_num, 7, &row.description)?;
        sheet.write_string(row_num, 8, row.business_reference.as_deref().unwrap_or_default())?;
        sheet.write_number(row_num, 9, cod)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Build the two-sheet income workbook.
///
/// # Errors
///
/// Returns `ExportError::Xlsx` if the workbook cannot be written.
pub fn income_workbook(report: &IncomeReport) -> Result<Vec<u8>, ExportError> {
    let bold = header_format();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("إحصائيات الدخل")?;
    write_headers(sheet, &INCOME_HEADERS, None)?;

    let mut row_num = 1_u32;
    for line in &report.lines {
        sheet.write_string(row_num, 0, &line.name)?;
        sheet.write_string(row_num, 1, &line.phone)?;
        sheet.write_number(row_num, 2, number(line.cash))?;
        sheet.write_number(row_num, 3, number(line.shipping))?;
        sheet.write_number(row_num, 4, number(line.manufacturing))?;
        sheet.write_number(row_num, 5, number(line.net))?;
        sheet.write_string(row_num, 6, line.status_label())?;
        sheet.write_string(row_num, 7, &line.date)?;
        row_num += 1;
    }

    // Blank separator row, then the totals.
    row_num += 1;
    let stats = [
        format!("عدد الطلبات الموصلة: {}", report.delivered_count),
        format!("عدد الطلبات المرتجعة: {}", report.returned_count),
        format!("اجمالي المستحق: {}", report.total_cash),
        format!("اجمالي مصاريف الشحن: {}", report.total_shipping),
        format!("اجمالي تكلفة التصنيع: {}", report.total_manufacturing),
        format!("صافي المستحق: {}", report.total_net),
        String::new(),
        String::new(),
    ];
    for (col, value) in (0_u16..).zip(&stats) {
        sheet.write_string_with_format(row_num, col, value, &bold)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("إحصائيات المنتجات")?;
    write_headers(sheet, &PRODUCT_HEADERS, Some(&bold))?;
    for (row_num, product) in (1_u32..).zip(&report.products) {
        sheet.write_string(row_num, 0, &product.name)?;
        #[allow(clippy::cast_precision_loss)]
        let quantity = product.quantity as f64;
        sheet.write_number(row_num, 1, quantity)?;
        sheet.write_number(row_num, 2, number(product.revenue))?;
        sheet.write_number(row_num, 3, number(product.cost))?;
        sheet.write_number(row_num, 4, number(product.profit()))?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// `Content-Disposition` value for a UTF-8 download name.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn income(status: ShippingStatus, cod: i64, ship: i64) -> IncomeRow {
        IncomeRow {
            name: "منى".to_owned(),
            phone: "01000000000".to_owned(),
            shipping_status: status,
            cod_amount: Decimal::from(cod),
            shipping_price: Decimal::from(ship),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_income_report_totals() {
        let orders = [
            income(ShippingStatus::Delivered, 500, 80),
            income(ShippingStatus::Returned, 300, 60),
        ];
        let report = income_report(&orders, &[]);
        assert_eq!(report.delivered_count, 1);
        assert_eq!(report.returned_count, 1);
        assert_eq!(report.total_cash, Decimal::from(500));
        assert_eq!(report.total_shipping, Decimal::from(140));
        assert_eq!(report.total_manufacturing, Decimal::from(40));
        assert_eq!(report.total_net, Decimal::from(320));

        let returned = report.lines.get(1).unwrap();
        assert_eq!(returned.cash, Decimal::ZERO);
        assert_eq!(returned.net, Decimal::from(-80));
        assert_eq!(returned.status_label(), "مرتجع");
        assert_eq!(returned.date, "2025-03-04 09:30");
    }

    #[test]
    fn test_product_income_uses_exact_names() {
        let products = [
            IncomeProductRow {
                name: "زيت".to_owned(),
                quantity: 3,
                price: Decimal::from(250),
            },
            IncomeProductRow {
                name: "زيت الأرغان".to_owned(),
                quantity: 1,
                price: Decimal::from(300),
            },
        ];
        let report = income_report(&[], &products);
        let oil = report.products.first().unwrap();
        assert_eq!(oil.revenue, Decimal::from(750));
        assert_eq!(oil.cost, Decimal::from(420));
        assert_eq!(oil.profit(), Decimal::from(330));
        assert_eq!(report.products.get(1).unwrap().cost, Decimal::ZERO);
    }

    #[test]
    fn test_workbooks_are_zip_files() {
        let rows = [ExportRow {
            name: "منى".to_owned(),
            phone: "010".to_owned(),
            city_name: None,
            zone_id: "z1".to_owned(),
            address: "شارع".to_owned(),
            cod_amount: Decimal::from(500),
            pieces: 2,
            description: "زيت, سبراي".to_owned(),
            business_reference: None,
        }];
        let orders = orders_workbook(&rows).unwrap();
        assert!(orders.starts_with(b"PK"));

        let report = income_report(&[income(ShippingStatus::Delivered, 500, 80)], &[]);
        assert!(income_workbook(&report).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_content_disposition_encodes_name() {
        let header = content_disposition(ORDERS_FILENAME);
        assert!(header.starts_with("attachment; filename*=UTF-8''%D8"));
        assert!(header.ends_with(".xlsx"));
    }
}
