// src/services/document_service.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use genpdf::{elements, style, Element};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DirectoryRepositoryRef, LedgerRepositoryRef},
    models::{
        auth::ActingUser,
        credit::{CreditType, StaffCredit},
        finance::{FinancialTitle, TitleDirection, TitleOrigin},
    },
    services::compensation::{fee_breakdown, FeeBreakdown, CONTRACTUAL_FEE_RATE},
};

/// Uma linha do comprovante: o crédito pago e, se veio de um evento, a base de cálculo.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherLine {
    pub description: String,
    pub credit_type: CreditType,
    pub value: Decimal,
    pub event_breakdown: Option<FeeBreakdown>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepasseVoucher {
    pub title_id: Uuid,
    pub staff_name: String,
    pub paid_at: DateTime<Utc>,
    pub total: Decimal,
    pub lines: Vec<VoucherLine>,
}

fn money(value: Decimal) -> String {
    format!("R$ {:.2}", value)
}

fn render_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

#[derive(Clone)]
pub struct DocumentService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
    fonts_dir: PathBuf,
}

impl DocumentService {
    pub fn new(ledger: LedgerRepositoryRef, directory: DirectoryRepositoryRef, fonts_dir: PathBuf) -> Self {
        Self { ledger, directory, fonts_dir }
    }

    /// Monta os dados do comprovante de um título de repasse.
    ///
    /// Os créditos do repasse são os do profissional pagos no mesmo instante
    /// gravado no título (o commit usa um único timestamp).
    pub async fn build_voucher(&self, actor: &ActingUser, title_id: Uuid) -> Result<RepasseVoucher, AppError> {
        let title = self
            .ledger
            .find_title(title_id)
            .await?
            .ok_or_else(|| AppError::not_found("Título"))?;

        let (staff_id, paid_at) = match repasse_parts(&title) {
            Some(parts) => parts,
            None => return Err(AppError::not_found("Repasse")),
        };
        actor.ensure_can_access_staff(staff_id, "ver comprovantes de repasse")?;

        let staff = self
            .directory
            .find_staff(staff_id)
            .await?
            .ok_or_else(|| AppError::not_found("Profissional"))?;

        let credits: Vec<StaffCredit> = self
            .ledger
            .list_credits(staff_id)
            .await?
            .into_iter()
            .filter(|c| c.is_paid() && c.payment_date == Some(paid_at))
            .collect();

        let mut lines = Vec::with_capacity(credits.len());
        for credit in credits {
            let event_breakdown = match credit.financial_event_id {
                Some(event_id) => self
                    .ledger
                    .find_event(event_id)
                    .await?
                    .map(|event| fee_breakdown(event.total_value)),
                None => None,
            };
            lines.push(VoucherLine {
                description: credit.description,
                credit_type: credit.credit_type,
                value: credit.value,
                event_breakdown,
            });
        }

        Ok(RepasseVoucher {
            title_id: title.id,
            staff_name: staff.name,
            paid_at,
            total: title.value,
            lines,
        })
    }

    pub async fn generate_voucher_pdf(&self, actor: &ActingUser, title_id: Uuid) -> Result<Vec<u8>, AppError> {
        let voucher = self.build_voucher(actor, title_id).await?;
        let bytes = self.render_voucher(&voucher)?;
        tracing::info!("Comprovante do repasse {} gerado ({} bytes)", title_id, bytes.len());
        Ok(bytes)
    }

    pub fn render_voucher(&self, voucher: &RepasseVoucher) -> Result<Vec<u8>, AppError> {
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None).map_err(|_| {
            AppError::FontNotFound(format!("Fonte não encontrada na pasta {}", self.fonts_dir.display()))
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Comprovante de repasse {}", voucher.title_id));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        doc.push(elements::Paragraph::new("COMPROVANTE DE REPASSE")
            .styled(style::Style::new().bold().with_font_size(16)));
        doc.push(elements::Break::new(1));
        doc.push(elements::Paragraph::new(format!("Profissional: {}", voucher.staff_name)));
        doc.push(elements::Paragraph::new(format!("Data do pagamento: {}", voucher.paid_at.format("%d/%m/%Y"))));
        doc.push(elements::Break::new(1.5));

        // Descrição (4), Tipo (2), Valor bruto do evento (2), Valor (2)
        let mut table = elements::TableLayout::new(vec![4, 2, 2, 2]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let style_bold = style::Style::new().bold();
        table.row()
            .element(elements::Paragraph::new("Crédito").styled(style_bold))
            .element(elements::Paragraph::new("Tipo").styled(style_bold))
            .element(elements::Paragraph::new("Bruto do evento").styled(style_bold))
            .element(elements::Paragraph::new("Valor").styled(style_bold))
            .push()
            .map_err(render_error)?;

        for line in &voucher.lines {
            let gross = line
                .event_breakdown
                .as_ref()
                .map(|b| money(b.gross))
                .unwrap_or_else(|| "-".to_string());
            table.row()
                .element(elements::Paragraph::new(line.description.clone()))
                .element(elements::Paragraph::new(format!("{:?}", line.credit_type).to_uppercase()))
                .element(elements::Paragraph::new(gross))
                .element(elements::Paragraph::new(money(line.value)))
                .push()
                .map_err(render_error)?;
        }
        doc.push(table);
        doc.push(elements::Break::new(1.5));

        let mut total_paragraph = elements::Paragraph::new(format!("TOTAL REPASSADO: {}", money(voucher.total)));
        total_paragraph.set_alignment(genpdf::Alignment::Right);
        doc.push(total_paragraph.styled(style::Style::new().bold().with_font_size(12)));

        // Base de cálculo dos honorários
        let breakdowns: Vec<&FeeBreakdown> = voucher.lines.iter().filter_map(|l| l.event_breakdown.as_ref()).collect();
        if !breakdowns.is_empty() {
            doc.push(elements::Break::new(2));
            doc.push(elements::Paragraph::new(format!(
                "Honorários contratuais de {:.0}% sobre o valor bruto de cada evento:",
                CONTRACTUAL_FEE_RATE * Decimal::ONE_HUNDRED
            ))
            .styled(style::Style::new().italic().with_font_size(9)));
            for b in breakdowns {
                doc.push(elements::Paragraph::new(format!(
                    "Bruto {} | Escritório {} | Cliente {}",
                    money(b.gross),
                    money(b.firm_fee),
                    money(b.client_share)
                ))
                .styled(style::Style::new().with_font_size(9)));
            }
        }

        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(render_error)?;
        Ok(buffer)
    }
}

/// Um título é comprovante de repasse se for despesa de honorários pagos, de um profissional, já paga.
fn repasse_parts(title: &FinancialTitle) -> Option<(Uuid, DateTime<Utc>)> {
    if title.direction != TitleDirection::Despesa || title.origin != TitleOrigin::HonorariosPagos {
        return None;
    }
    Some((title.staff_id?, title.payment_date?))
}
