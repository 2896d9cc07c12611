//! Header → canonical field mapping for row-per-record sheets
//!
//! [`ColumnMap::build`] runs once per sheet and produces an immutable,
//! typed mapping that the row mapper consumes by field instead of probing
//! header names row after row.

use std::collections::BTreeMap;

use crate::mapping::normalize::{matches_either_way, normalize};

/// Number of repeated task / part / supply column groups per row
pub const ITEM_GROUPS: u32 = 5;

/// Canonical work order fields a header can map to
///
/// Declaration order is match order: earlier fields get first pick of an
/// ambiguous header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Folio,
    Responsible,
    Machine,
    ActionType,
    FaultType,
    StartDate,
    EndDate,
    PlannedDate,
    ReviewDate,
    Days,
    Persons,
    LaborHours,
    Status,
    MaintenanceAchieved,
    Observation,
    Description,
    Brand,
    Model,
    Location,
    Supervisor,
    Odometer,
    ReviewedBy,
    ReceivedBy,
}

impl Field {
    pub const ALL: [Field; 23] = [
        Field::Folio,
        Field::Responsible,
        Field::Machine,
        Field::ActionType,
        Field::FaultType,
        Field::StartDate,
        Field::EndDate,
        Field::PlannedDate,
        Field::ReviewDate,
        Field::Days,
        Field::Persons,
        Field::LaborHours,
        Field::Status,
        Field::MaintenanceAchieved,
        Field::Observation,
        Field::Description,
        Field::Brand,
        Field::Model,
        Field::Location,
        Field::Supervisor,
        Field::Odometer,
        Field::ReviewedBy,
        Field::ReceivedBy,
    ];

    /// Fields whose absence is reported after mapping
    pub const REQUIRED: [Field; 4] = [
        Field::Responsible,
        Field::Machine,
        Field::FaultType,
        Field::StartDate,
    ];

    /// Stable canonical name
    pub fn canonical(&self) -> &'static str {
        match self {
            Field::Folio => "ot",
            Field::Responsible => "encargado",
            Field::Machine => "maquina",
            Field::ActionType => "tipo_accion",
            Field::FaultType => "tipo_falla",
            Field::StartDate => "fecha_inicio",
            Field::EndDate => "fecha_termino",
            Field::PlannedDate => "fecha_planificada",
            Field::ReviewDate => "fecha_revision",
            Field::Days => "dias",
            Field::Persons => "personas",
            Field::LaborHours => "hh",
            Field::Status => "estado",
            Field::MaintenanceAchieved => "mantencion_lograda",
            Field::Observation => "observacion",
            Field::Description => "descripcion",
            Field::Brand => "marca",
            Field::Model => "modelo",
            Field::Location => "ubicacion",
            Field::Supervisor => "supervisor",
            Field::Odometer => "odometro",
            Field::ReviewedBy => "revisado_por",
            Field::ReceivedBy => "recibido_por",
        }
    }

    /// Known header spellings, most specific first
    pub fn variants(&self) -> &'static [&'static str] {
        match self {
            Field::Folio => &[
                "ot",
                "orden de trabajo",
                "orden",
                "n",
                "numero",
                "numero ot",
                "nº",
                "n°",
                "numero_ot",
                "folio",
            ],
            Field::Responsible => &[
                "encargado",
                "responsable",
                "responsable de ejecucion",
                "responsable_ejecucion",
            ],
            Field::Machine => &["maquina", "máquina", "equipo", "equipo maquina", "equipo_maquina"],
            Field::ActionType => &["tipo de accion", "tipo_accion", "tipo accion", "accion"],
            Field::FaultType => &["tipo de falla", "tipo_falla", "falla", "tipo"],
            Field::StartDate => &["fecha inicio", "fecha_inicio", "fecha de inicio", "inicio"],
            Field::EndDate => &["fecha termino", "fecha_termino", "fecha de termino", "termino"],
            Field::PlannedDate => &["fecha planificada", "fecha_planificada", "fecha programada", "planificada"],
            Field::ReviewDate => &["fecha revision", "fecha_revision", "fecha de revision"],
            Field::Days => &["dias", "días"],
            Field::Persons => &["personas"],
            Field::LaborHours => &["hh", "horas", "horas hombre"],
            Field::Status => &["estado", "status"],
            Field::MaintenanceAchieved => &[
                "mantencion lograda",
                "mantencion_lograda",
                "mantencion",
                "realizada",
            ],
            Field::Observation => &["observacion", "observación", "observaciones"],
            Field::Description => &["descripcion", "descripcion del trabajo", "descripción"],
            Field::Brand => &["marca"],
            Field::Model => &["modelo"],
            Field::Location => &["ubicacion", "ubicación", "lugar"],
            Field::Supervisor => &["supervisor"],
            Field::Odometer => &["odometro", "odómetro", "horometro", "kilometraje"],
            Field::ReviewedBy => &["revisado por", "revisado_por", "revisado"],
            Field::ReceivedBy => &["recibido por", "recibido_por", "recibido"],
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Columns of the i-th numbered task group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskColumns {
    pub number: u32,
    pub detail: Option<usize>,
    pub estimated: Option<usize>,
    pub actual: Option<usize>,
}

/// Columns of the i-th numbered part or supply group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialColumns {
    pub number: u32,
    pub code: Option<usize>,
    pub description: Option<usize>,
    pub quantity: Option<usize>,
}

/// Resolved header layout of a row-per-record sheet
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    headers: Vec<String>,
    fields: BTreeMap<Field, usize>,
    tasks: Vec<TaskColumns>,
    parts: Vec<MaterialColumns>,
    supplies: Vec<MaterialColumns>,
}

/// Shared claim bookkeeping while building a map
struct Matcher {
    normalized: Vec<String>,
    claimed: Vec<bool>,
}

impl Matcher {
    fn new(headers: &[String]) -> Self {
        Self {
            normalized: headers.iter().map(|h| normalize(h)).collect(),
            claimed: vec![false; headers.len()],
        }
    }

    /// First unclaimed header whose normalized text equals a variant
    fn claim_exact(&mut self, variants: &[String]) -> Option<usize> {
        let found = variants.iter().find_map(|v| {
            self.normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !self.claimed[*i] && !h.is_empty() && *h == v)
                .map(|(i, _)| i)
        })?;
        self.claimed[found] = true;
        Some(found)
    }

    /// First unclaimed header contained in, or containing, a variant
    fn claim_containing(&mut self, variants: &[String]) -> Option<usize> {
        let found = variants.iter().find_map(|v| {
            self.normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !self.claimed[*i] && matches_either_way(h, v))
                .map(|(i, _)| i)
        })?;
        self.claimed[found] = true;
        Some(found)
    }
}

fn normalized(variants: &[&str]) -> Vec<String> {
    variants.iter().map(|v| normalize(v)).collect()
}

fn numbered(templates: &[&str], i: u32) -> Vec<String> {
    templates
        .iter()
        .map(|t| normalize(&t.replace("{i}", &i.to_string())))
        .collect()
}

const TASK_DETAIL: &[&str] = &["tarea {i}", "tarea{i}", "detalle {i}", "detalle{i}", "descripcion tarea {i}"];
const TASK_ESTIMATED: &[&str] = &["tiempo estimado {i}", "tiempo_estimado{i}", "tiempo estimado{i}", "tiempoestimado{i}"];
const TASK_ACTUAL: &[&str] = &["tiempo real {i}", "tiempo_real{i}", "tiempo real{i}", "tiemporeal{i}"];

const PART_CODE: &[&str] = &["repuesto codigo {i}", "repuestocodigo{i}", "repuesto_codigo{i}", "codigo repuesto {i}", "codigo_repuesto{i}"];
const PART_DESC: &[&str] = &["repuesto desc {i}", "repuesto desc{i}", "repuesto descripcion {i}", "repuestodesc{i}"];
const PART_QTY: &[&str] = &["repuesto cantidad {i}", "repuesto_cantidad{i}", "repuestocantidad{i}", "cantidad repuesto {i}"];

const SUPPLY_CODE: &[&str] = &["insumo codigo {i}", "insumocodigo{i}", "insumo_codigo{i}", "codigo insumo {i}"];
const SUPPLY_DESC: &[&str] = &["insumo desc {i}", "insumo desc{i}", "insumo descripcion {i}", "insumodesc{i}"];
const SUPPLY_QTY: &[&str] = &["insumo cantidad {i}", "insumo_cantidad{i}", "insumocantidad{i}", "cantidad insumo {i}"];

impl ColumnMap {
    /// Map detected headers onto canonical fields and numbered item groups
    ///
    /// Item-group columns ("Tarea 1", "repuestoCodigo2") are claimed first by
    /// exact normalized name. Main fields then go in declaration order, an
    /// exact pass over all fields followed by a bidirectional containment
    /// pass for those still unresolved. A claimed column is never reused.
    ///
    /// This departs from a strict per-field walk where each field's first
    /// containment hit wins: an exact header elsewhere in the row always
    /// beats a looser match claimed by an earlier field.
    pub fn build(headers: &[String]) -> Self {
        let mut m = Matcher::new(headers);

        let mut tasks = Vec::new();
        let mut parts = Vec::new();
        let mut supplies = Vec::new();
        for i in 1..=ITEM_GROUPS {
            let task = TaskColumns {
                number: i,
                detail: m.claim_exact(&numbered(TASK_DETAIL, i)),
                estimated: m.claim_exact(&numbered(TASK_ESTIMATED, i)),
                actual: m.claim_exact(&numbered(TASK_ACTUAL, i)),
            };
            if task.detail.is_some() || task.estimated.is_some() || task.actual.is_some() {
                tasks.push(task);
            }

            let part = MaterialColumns {
                number: i,
                code: m.claim_exact(&numbered(PART_CODE, i)),
                description: m.claim_exact(&numbered(PART_DESC, i)),
                quantity: m.claim_exact(&numbered(PART_QTY, i)),
            };
            if part.code.is_some() || part.description.is_some() || part.quantity.is_some() {
                parts.push(part);
            }

            let supply = MaterialColumns {
                number: i,
                code: m.claim_exact(&numbered(SUPPLY_CODE, i)),
                description: m.claim_exact(&numbered(SUPPLY_DESC, i)),
                quantity: m.claim_exact(&numbered(SUPPLY_QTY, i)),
            };
            if supply.code.is_some() || supply.description.is_some() || supply.quantity.is_some() {
                supplies.push(supply);
            }
        }

        let mut fields = BTreeMap::new();
        for field in Field::ALL {
            if let Some(col) = m.claim_exact(&normalized(field.variants())) {
                fields.insert(field, col);
            }
        }
        for field in Field::ALL {
            if fields.contains_key(&field) {
                continue;
            }
            if let Some(col) = m.claim_containing(&normalized(field.variants())) {
                fields.insert(field, col);
            }
        }

        Self {
            headers: headers.to_vec(),
            fields,
            tasks,
            parts,
            supplies,
        }
    }

    /// Column index for a field, if mapped
    pub fn column(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    /// Original header text a field mapped to
    pub fn header(&self, field: Field) -> Option<&str> {
        self.column(field)
            .and_then(|c| self.headers.get(c))
            .map(String::as_str)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Resolved fields in declaration order
    pub fn resolved(&self) -> Vec<Field> {
        self.fields.keys().copied().collect()
    }

    /// Required fields that found no column
    pub fn missing_required(&self) -> Vec<Field> {
        Field::REQUIRED
            .iter()
            .filter(|f| !self.fields.contains_key(f))
            .copied()
            .collect()
    }

    /// No canonical main field resolved at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn tasks(&self) -> &[TaskColumns] {
        &self.tasks
    }

    pub fn parts(&self) -> &[MaterialColumns] {
        &self.parts
    }

    pub fn supplies(&self) -> &[MaterialColumns] {
        &self.supplies
    }
}
