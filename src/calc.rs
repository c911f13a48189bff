use serde::Serialize;

/// Letter grades accepted by the grader. `F` exists on the points scale but is
/// never accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeLetter {
    A,
    B,
    C,
    D,
}

impl GradeLetter {
    /// Case-insensitive parse of an assignable letter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Points for a stored letter. Unknown letters (including the empty letter of
/// a rejection) have no points.
pub fn grade_points(letter: &str) -> Option<f64> {
    match letter.trim() {
        "A" => Some(4.0),
        "B" => Some(3.0),
        "C" => Some(2.0),
        "D" => Some(1.0),
        "F" => Some(0.0),
        _ => None,
    }
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Mean grade points over the letters that carry points. `None` means there
/// was nothing to average, which is not the same as a failing average.
pub fn average_grade_points<'a, I>(letters: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for letter in letters {
        if let Some(p) = grade_points(letter) {
            sum += p;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(round_2_decimals(sum / count as f64))
}

/// `round(100 * completed / total)`, undefined for a course without lectures.
pub fn progress_percentage(completed: usize, total: usize) -> Option<i64> {
    if total == 0 {
        return None;
    }
    let completed = completed.min(total);
    Some(((100 * completed) as f64 / total as f64).round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Complete,
}

pub fn progress_status(completed: usize, percentage: Option<i64>) -> ProgressStatus {
    match percentage {
        Some(100) => ProgressStatus::Complete,
        _ if completed == 0 => ProgressStatus::NotStarted,
        _ => ProgressStatus::InProgress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_parse_case_insensitively() {
        assert_eq!(GradeLetter::parse("b"), Some(GradeLetter::B));
        assert_eq!(GradeLetter::parse(" A "), Some(GradeLetter::A));
        assert_eq!(GradeLetter::parse("E"), None);
        assert_eq!(GradeLetter::parse("F"), None);
        assert_eq!(GradeLetter::parse(""), None);
    }

    #[test]
    fn average_skips_letterless_entries() {
        let avg = average_grade_points(["A", "B", "", "C"]);
        assert_eq!(avg, Some(3.0));
    }

    #[test]
    fn average_rounds_to_two_places() {
        // (4 + 4 + 3) / 3 = 3.666..
        assert_eq!(average_grade_points(["A", "A", "B"]), Some(3.67));
    }

    #[test]
    fn average_of_nothing_is_none_not_zero() {
        assert_eq!(average_grade_points(Vec::<&str>::new()), None);
        assert_eq!(average_grade_points([""]), None);
        assert_eq!(average_grade_points(["F"]), Some(0.0));
    }

    #[test]
    fn percentage_recomputes_against_current_total() {
        assert_eq!(progress_percentage(1, 4), Some(25));
        assert_eq!(progress_percentage(2, 4), Some(50));
        assert_eq!(progress_percentage(2, 5), Some(40));
        assert_eq!(progress_percentage(1, 3), Some(33));
        assert_eq!(progress_percentage(2, 3), Some(67));
        assert_eq!(progress_percentage(0, 0), None);
    }

    #[test]
    fn status_follows_percentage() {
        assert_eq!(progress_status(0, Some(0)), ProgressStatus::NotStarted);
        assert_eq!(progress_status(0, None), ProgressStatus::NotStarted);
        assert_eq!(progress_status(1, Some(50)), ProgressStatus::InProgress);
        assert_eq!(progress_status(2, Some(100)), ProgressStatus::Complete);
    }
}
