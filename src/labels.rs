use sys_locale::get_locale;

use crate::models::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Zh,
    En,
}

/// Maps the stored setting to a concrete language; `auto` (or anything unknown) follows the OS.
pub fn resolve_language(language: &str) -> Language {
    match normalize_language(language).as_str() {
        "zh" => Language::Zh,
        "en" => Language::En,
        _ => detect_system_language(),
    }
}

pub fn normalize_language(language: &str) -> String {
    let normalized = language.trim().to_lowercase();
    match normalized.as_str() {
        "zh" | "en" | "auto" => normalized,
        _ => "auto".to_string(),
    }
}

fn detect_system_language() -> Language {
    let locale = get_locale().unwrap_or_default().to_lowercase();
    if locale.starts_with("zh") {
        Language::Zh
    } else {
        Language::En
    }
}

/// Notification wording for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    lang: Language,
}

impl Labels {
    pub fn new(lang: Language) -> Self {
        Self { lang }
    }

    pub fn language(&self) -> Language {
        self.lang
    }

    pub fn title(&self, title: &str, priority: Priority) -> String {
        let prefix = match (self.lang, priority) {
            (Language::En, Priority::Urgent) => "[Urgent] ",
            (Language::En, Priority::High) => "[High] ",
            (Language::Zh, Priority::Urgent) => "[紧急] ",
            (Language::Zh, Priority::High) => "[重要] ",
            _ => "",
        };
        format!("{prefix}{title}")
    }

    pub fn body(&self, category: &str, lead_minutes: u32) -> String {
        let due = self.due_in(lead_minutes);
        let category = category.trim();
        if category.is_empty() {
            due
        } else {
            format!("{category} · {due}")
        }
    }

    fn due_in(&self, minutes: u32) -> String {
        if minutes == 0 {
            return match self.lang {
                Language::En => "Due now".to_string(),
                Language::Zh => "现在到期".to_string(),
            };
        }
        let (count, unit) = split_minutes(minutes);
        match self.lang {
            Language::En => {
                let unit = match unit {
                    Unit::Day => "day",
                    Unit::Hour => "hour",
                    Unit::Minute => "minute",
                };
                let plural = if count == 1 { "" } else { "s" };
                format!("Due in {count} {unit}{plural}")
            }
            Language::Zh => {
                let unit = match unit {
                    Unit::Day => "天",
                    Unit::Hour => "小时",
                    Unit::Minute => "分钟",
                };
                format!("{count}{unit}后到期")
            }
        }
    }
}

enum Unit {
    Day,
    Hour,
    Minute,
}

fn split_minutes(minutes: u32) -> (u32, Unit) {
    if minutes % 1440 == 0 {
        (minutes / 1440, Unit::Day)
    } else if minutes % 60 == 0 {
        (minutes / 60, Unit::Hour)
    } else {
        (minutes, Unit::Minute)
    }
}
