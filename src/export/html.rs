//! Printable HTML rendering of one order (tera template embedded with rust-embed)

use rust_embed::Embed;
use serde::Serialize;
use tera::Tera;

use super::table::date_text;
use super::ExportError;
use crate::entities::work_order::{display_or_unspecified, Material, OrderStatus, WorkOrder};

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const ORDER_TEMPLATE: &str = "order.html.tera";

#[derive(Serialize)]
struct MaterialSection<'a> {
    title: &'static str,
    items: &'a [Material],
}

/// Template renderer
pub struct HtmlRenderer {
    tera: Tera,
}

impl HtmlRenderer {
    /// Load every embedded template
    pub fn new() -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html", ".html.tera"]);

        for file in EmbeddedTemplates::iter() {
            let name = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(name) {
                let source = std::str::from_utf8(&content.data).map_err(|e| ExportError::Template(e.to_string()))?;
                tera.add_raw_template(name, source)
                    .map_err(|e| ExportError::Template(e.to_string()))?;
            }
        }

        Ok(Self { tera })
    }

    pub fn render(&self, order: &WorkOrder) -> Result<String, ExportError> {
        let mut context = tera::Context::new();
        context.insert("order", order);
        context.insert("status", &status_label(order));
        context.insert("start_date", &date_text(order.start_date));
        context.insert("end_date", &date_text(order.end_date));
        context.insert("machine", display_or_unspecified(&order.machine));
        context.insert("responsible", display_or_unspecified(&order.responsible));
        context.insert("fault_type", display_or_unspecified(&order.fault_type));
        context.insert(
            "materials",
            &[
                MaterialSection { title: "Repuestos requeridos", items: &order.parts },
                MaterialSection { title: "Insumos requeridos", items: &order.supplies },
            ],
        );

        self.tera
            .render(ORDER_TEMPLATE, &context)
            .map_err(|e| ExportError::Template(e.to_string()))
    }
}

fn status_label(order: &WorkOrder) -> &'static str {
    match order.status {
        OrderStatus::Pending => "Pendiente",
        OrderStatus::InProgress => "En proceso",
        OrderStatus::Done => "Terminada",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::work_order::Task;

    #[test]
    fn test_render_escapes_and_fills_unspecified() {
        let mut order = WorkOrder::new("OT-7");
        order.machine = "Prensa <B>".into();
        order.tasks.push(Task { number: 1, detail: "Cambiar filtro".into(), estimated_time: 1, actual_time: 2 });

        let html = HtmlRenderer::new().unwrap().render(&order).unwrap();
        assert!(html.contains("Orden de Trabajo N° OT-7"));
        assert!(html.contains("Prensa &lt;B&gt;"));
        assert!(html.contains("No Especificado"));
        assert!(html.contains("Cambiar filtro"));
        assert!(html.contains("Sin registros"));
        assert!(html.contains("Pendiente"));
    }
}
