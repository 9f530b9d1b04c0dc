use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GradeError;
use crate::grading;

/// One of the four assessments that make up a final grade. Names are
/// matched the same way everywhere: trimmed and case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Component {
    Np1,
    Np2,
    Ava,
    Pim,
}

impl Component {
    pub const ALL: [Component; 4] = [Component::Np1, Component::Np2, Component::Ava, Component::Pim];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Np1 => "np1",
            Component::Np2 => "np2",
            Component::Ava => "ava",
            Component::Pim => "pim",
        }
    }

    /// Name shown to students in notifications.
    pub fn friendly_name(self) -> &'static str {
        match self {
            Component::Np1 => "NP1 (Primeira Prova)",
            Component::Np2 => "NP2 (Segunda Prova)",
            Component::Ava => "AVA (Atividades Virtuais)",
            Component::Pim => "PIM (Projeto Integrado)",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "np1" => Ok(Component::Np1),
            "np2" => Ok(Component::Np2),
            "ava" => Ok(Component::Ava),
            "pim" => Ok(Component::Pim),
            _ => Err(GradeError::UnknownComponent(s.to_string())),
        }
    }
}

impl TryFrom<String> for Component {
    type Error = GradeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Academic standing derived from the final grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    #[serde(rename = "em_andamento")]
    InProgress,
    #[serde(rename = "aprovado")]
    Approved,
    #[serde(rename = "recuperacao")]
    Recovery,
    #[serde(rename = "reprovado")]
    Failed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::InProgress,
        Status::Approved,
        Status::Recovery,
        Status::Failed,
    ];

    /// Stored/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::InProgress => "em_andamento",
            Status::Approved => "aprovado",
            Status::Recovery => "recuperacao",
            Status::Failed => "reprovado",
        }
    }

    /// Badge text for presentation.
    pub fn label(self) -> &'static str {
        match self {
            Status::InProgress => "Em Andamento",
            Status::Approved => "Aprovado",
            Status::Recovery => "Recuperação",
            Status::Failed => "Reprovado",
        }
    }
}

/// One student's performance in one class for one semester.
///
/// `final_grade` and `status` are derived from the four components and are
/// only ever written by the constructors below and by
/// [`grading::apply_component_update`]. Deserialising goes through
/// [`GradeRecord::from_components`], so incoming derived values are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredGradeRecord")]
pub struct GradeRecord {
    pub student_id: String,
    pub class_id: String,
    pub semester: String,
    pub np1: Option<f64>,
    pub np2: Option<f64>,
    pub ava: Option<f64>,
    pub pim: Option<f64>,
    final_grade: Option<f64>,
    status: Status,
}

/// Wire shape of a record as supplied by the grade store.
#[derive(Deserialize)]
struct StoredGradeRecord {
    student_id: String,
    class_id: String,
    semester: String,
    np1: Option<f64>,
    np2: Option<f64>,
    ava: Option<f64>,
    pim: Option<f64>,
}

impl From<StoredGradeRecord> for GradeRecord {
    fn from(raw: StoredGradeRecord) -> Self {
        GradeRecord::from_components(
            raw.student_id,
            raw.class_id,
            raw.semester,
            [raw.np1, raw.np2, raw.ava, raw.pim],
        )
    }
}

impl GradeRecord {
    /// A freshly enrolled record: nothing graded yet.
    pub fn enrolled(
        student_id: impl Into<String>,
        class_id: impl Into<String>,
        semester: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            class_id: class_id.into(),
            semester: semester.into(),
            np1: None,
            np2: None,
            ava: None,
            pim: None,
            final_grade: None,
            status: Status::InProgress,
        }
    }

    /// Rebuilds a record from stored component scores, recomputing the
    /// derived fields.
    pub fn from_components(
        student_id: impl Into<String>,
        class_id: impl Into<String>,
        semester: impl Into<String>,
        [np1, np2, ava, pim]: [Option<f64>; 4],
    ) -> Self {
        let mut record = Self::enrolled(student_id, class_id, semester);
        record.np1 = np1;
        record.np2 = np2;
        record.ava = ava;
        record.pim = pim;
        record.refresh_derived();
        record
    }

    pub fn final_grade(&self) -> Option<f64> {
        self.final_grade
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn set_component(&mut self, component: Component, value: Option<f64>) {
        let slot = match component {
            Component::Np1 => &mut self.np1,
            Component::Np2 => &mut self.np2,
            Component::Ava => &mut self.ava,
            Component::Pim => &mut self.pim,
        };
        *slot = value;
    }

    pub(crate) fn refresh_derived(&mut self) {
        self.final_grade = grading::final_grade_of(self.np1, self.np2, self.ava, self.pim);
        self.status = grading::classify(self.final_grade);
    }
}

/// A single-field update request: set (or clear) one component of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeUpdate {
    pub student_id: String,
    pub class_id: String,
    pub semester: String,
    pub grade_type: Component,
    pub value: Option<f64>,
}

/// Aggregate statistics over a set of grade records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    /// Mean of the defined final grades, or `0.0` when none is defined. A zero
    /// here means "nothing graded", not a real average; check
    /// `highest.is_some()` before showing it as a score.
    pub average: f64,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub total_students: usize,
    pub approved_count: usize,
    /// Percentage of graded records that are approved, 0..=100.
    pub approval_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
}

/// A notification as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredNotification {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
