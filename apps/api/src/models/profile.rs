use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of everything the applicant submitted for one evaluation.
/// Shared read-only across analyzer tasks; never mutated mid-pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub applicant_id: Uuid,
    pub grade_level: GradeLevel,
    pub academic: AcademicRecord,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub awards: Vec<Award>,
    #[serde(default)]
    pub essays: Vec<Essay>,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub context: ApplicantContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeLevel {
    Ninth,
    Tenth,
    Eleventh,
    Twelfth,
}

impl GradeLevel {
    pub fn label(&self) -> &'static str {
        match self {
            GradeLevel::Ninth => "9th grade",
            GradeLevel::Tenth => "10th grade",
            GradeLevel::Eleventh => "11th grade",
            GradeLevel::Twelfth => "12th grade",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicRecord {
    /// 4.0 scale.
    pub gpa_unweighted: Option<f64>,
    /// 5.0 scale.
    pub gpa_weighted: Option<f64>,
    pub class_rank: Option<ClassRank>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub test_scores: TestScores,
    #[serde(default)]
    pub school: SchoolContext,
}

impl AcademicRecord {
    /// Courses above the regular track (honors excluded).
    pub fn advanced_course_count(&self) -> usize {
        self.courses.iter().filter(|c| c.rigor.is_advanced()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRank {
    pub rank: u32,
    pub class_size: u32,
}

impl ClassRank {
    /// Fraction of the class at or below this rank, 0.0 to 1.0.
    pub fn percentile(&self) -> f64 {
        if self.class_size == 0 {
            return 0.0;
        }
        let above = self.rank.saturating_sub(1) as f64;
        (1.0 - above / self.class_size as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub subject: String,
    pub rigor: CourseRigor,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseRigor {
    Regular,
    Honors,
    AdvancedPlacement,
    InternationalBaccalaureate,
    DualEnrollment,
}

impl CourseRigor {
    pub fn is_advanced(&self) -> bool {
        matches!(
            self,
            CourseRigor::AdvancedPlacement
                | CourseRigor::InternationalBaccalaureate
                | CourseRigor::DualEnrollment
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestScores {
    pub sat: Option<u16>,
    pub act: Option<u8>,
    #[serde(default)]
    pub ap_exams: Vec<ApExam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApExam {
    pub subject: String,
    pub score: u8,
}

/// What the applicant's school makes available. Drives rigor normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchoolContext {
    pub name: Option<String>,
    /// Number of AP/IB/dual-enrollment courses the school offers, if known.
    pub advanced_courses_offered: Option<u32>,
    pub graduating_class_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub category: ActivityCategory,
    pub role: String,
    pub years: f64,
    pub hours_per_week: f64,
    #[serde(default = "default_weeks_per_year")]
    pub weeks_per_year: f64,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub awards: Vec<String>,
}

fn default_weeks_per_year() -> f64 {
    36.0
}

impl Activity {
    pub fn total_hours(&self) -> f64 {
        (self.hours_per_week * self.weeks_per_year * self.years).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Academic,
    Research,
    Arts,
    Athletics,
    Service,
    Work,
    Family,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Award {
    pub name: String,
    pub level: AwardLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardLevel {
    School,
    Regional,
    State,
    National,
    International,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Essay {
    pub kind: EssayKind,
    pub prompt: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EssayKind {
    Personal,
    Supplemental,
    ShortAnswer,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Goals {
    pub intended_major: Option<String>,
    #[serde(default)]
    pub career_interests: Vec<String>,
    #[serde(default)]
    pub target_institutions: Vec<String>,
}

/// Demographic and circumstance flags. These adjust interpretation, never penalize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicantContext {
    #[serde(default)]
    pub first_generation: bool,
    #[serde(default)]
    pub low_income: bool,
    #[serde(default)]
    pub under_resourced_school: bool,
    #[serde(default)]
    pub family_responsibilities: bool,
    pub family_responsibility_hours: Option<f64>,
    pub additional_info: Option<String>,
}

impl ApplicantProfile {
    /// Essays with non-whitespace text.
    pub fn written_essays(&self) -> impl Iterator<Item = &Essay> {
        self.essays.iter().filter(|e| !e.text.trim().is_empty())
    }

    pub fn essay_word_count(&self) -> usize {
        self.written_essays()
            .map(|e| e.text.split_whitespace().count())
            .sum()
    }

    /// Out-of-range fields, one message each. Empty when the profile is usable.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let academic = &self.academic;

        if let Some(gpa) = academic.gpa_unweighted {
            if !(0.0..=4.0).contains(&gpa) {
                errors.push(format!("gpa_unweighted {gpa} is outside 0.0-4.0"));
            }
        }
        if let Some(gpa) = academic.gpa_weighted {
            if !(0.0..=5.0).contains(&gpa) {
                errors.push(format!("gpa_weighted {gpa} is outside 0.0-5.0"));
            }
        }
        if let Some(rank) = &academic.class_rank {
            if rank.rank == 0 || rank.rank > rank.class_size {
                errors.push(format!(
                    "class rank {} of {} is not a valid position",
                    rank.rank, rank.class_size
                ));
            }
        }
        if let Some(sat) = academic.test_scores.sat {
            if !(400..=1600).contains(&sat) {
                errors.push(format!("SAT {sat} is outside 400-1600"));
            }
        }
        if let Some(act) = academic.test_scores.act {
            if !(1..=36).contains(&act) {
                errors.push(format!("ACT {act} is outside 1-36"));
            }
        }
        for exam in &academic.test_scores.ap_exams {
            if !(1..=5).contains(&exam.score) {
                errors.push(format!("AP {} score {} is outside 1-5", exam.subject, exam.score));
            }
        }
        for activity in &self.activities {
            if activity.name.trim().is_empty() {
                errors.push("activity name must not be blank".to_string());
            }
            let counts = [activity.years, activity.hours_per_week, activity.weeks_per_year];
            if counts.iter().any(|v| !v.is_finite() || *v < 0.0) {
                errors.push(format!(
                    "activity '{}' has negative or non-finite time fields",
                    activity.name
                ));
            }
            if activity.hours_per_week > 168.0 || activity.weeks_per_year > 52.0 {
                errors.push(format!(
                    "activity '{}' exceeds the hours in a week or weeks in a year",
                    activity.name
                ));
            }
        }
        if let Some(hours) = self.context.family_responsibility_hours {
            if !(0.0..=168.0).contains(&hours) {
                errors.push(format!("family_responsibility_hours {hours} is outside 0-168"));
            }
        }
        errors
    }
}
