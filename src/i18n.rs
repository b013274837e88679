use std::sync::{Mutex, PoisonError};
use lazy_static::lazy_static;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    En,
    Zh,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Language> {
        match code.to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "zh" | "cn" | "chinese" => Some(Language::Zh),
            _ => None,
        }
    }

    pub fn native_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Zh => "中文",
        }
    }
}

lazy_static! {
    static ref CURRENT_LANG: Mutex<Language> = Mutex::new(Language::En);
}

pub fn set_language(lang: Language) {
    *CURRENT_LANG.lock().unwrap_or_else(PoisonError::into_inner) = lang;
}

pub fn get_language() -> Language {
    *CURRENT_LANG.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Looks up `key` in the current language, falling back to the key itself.
pub fn t(key: &str) -> String {
    let val = match get_language() {
        Language::En => get_en(key),
        Language::Zh => get_zh(key),
    };
    if val.is_empty() {
        key.to_string()
    } else {
        val.to_string()
    }
}

fn get_zh(key: &str) -> &'static str {
    match key {
        "app_title" => "A-B 循环练习播放器",
        "open_file" => "打开文件...",
        "drag_drop" => "拖拽音频文件到此处",
        "reading" => "读取文件中...",
        "unknown_title" => "未知标题",
        "unknown_artist" => "未知艺术家",
        "unknown_album" => "未知专辑",
        "play" => "播放",
        "pause" => "暂停",
        "volume" => "音量",
        "position" => "当前位置",
        "loop_start" => "循环起点",
        "loop_end" => "循环终点",
        "mark_start" => "设为起点",
        "mark_end" => "设为终点",
        "reset_loop" => "整首循环",
        "load_fail" => "加载失败：",
        "no_audio_device" => "未找到音频输出设备",
        _ => "",
    }
}

fn get_en(key: &str) -> &'static str {
    match key {
        "app_title" => "A-B Loop Practice Player",
        "open_file" => "Open File...",
        "drag_drop" => "Drag & Drop Audio File Here",
        "reading" => "Reading file...",
        "unknown_title" => "Unknown Title",
        "unknown_artist" => "Unknown Artist",
        "unknown_album" => "Unknown Album",
        "play" => "Play",
        "pause" => "Pause",
        "volume" => "Volume",
        "position" => "Position",
        "loop_start" => "Loop Start",
        "loop_end" => "Loop End",
        "mark_start" => "Set Start Here",
        "mark_end" => "Set End Here",
        "reset_loop" => "Loop Whole Track",
        "load_fail" => "Load Failed: ",
        "no_audio_device" => "No audio output device found",
        _ => "",
    }
}
