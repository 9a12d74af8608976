/// Message tables for the terminal UI.
/// Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub batch_started: &'static str,
    pub batch_finished: &'static str,
    pub summary_header: &'static str,
    pub status_waiting: &'static str,
    pub status_processing: &'static str,
    pub status_done: &'static str,
    pub status_failed: &'static str,
    pub saved: &'static str,
    pub item_added: &'static str,
    pub item_removed: &'static str,
    pub delivered: &'static str,
    pub skipped_input: &'static str,
    pub nothing_to_do: &'static str,
    pub info_prefix: &'static str,
    pub warn_prefix: &'static str,
    pub error_prefix: &'static str,
}

pub static EN: Messages = Messages {
    batch_started: "Batch started",
    batch_finished: "Batch finished",
    summary_header: "Summary",
    status_waiting: "waiting",
    status_processing: "processing",
    status_done: "done",
    status_failed: "failed",
    saved: "saved",
    item_added: "queued",
    item_removed: "removed",
    delivered: "saved to",
    skipped_input: "skipped unreadable input",
    nothing_to_do: "no files to process",
    info_prefix: "INFO",
    warn_prefix: "WARN",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    batch_started: "批处理已开始",
    batch_finished: "批处理已完成",
    summary_header: "摘要",
    status_waiting: "等待中",
    status_processing: "处理中",
    status_done: "完成",
    status_failed: "失败",
    saved: "节省",
    item_added: "已加入队列",
    item_removed: "已移除",
    delivered: "已保存到",
    skipped_input: "已跳过无法读取的文件",
    nothing_to_do: "没有可处理的文件",
    info_prefix: "信息",
    warn_prefix: "警告",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_aliases() {
        assert_eq!(Locale::parse("zh-CN"), Locale::Zh);
        assert_eq!(Locale::parse("zh_tw"), Locale::Zh);
        assert_eq!(Locale::parse("fr"), Locale::En);
        assert_eq!(get_messages(Locale::Zh).status_done, "完成");
    }
}
