use teloxide::types::{ InlineKeyboardButton, InlineKeyboardMarkup };

use crate::enums::TimeWindow;
use super::constants::callbacks as cb;

// Main menu keyboard
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        vec![
            vec![
                InlineKeyboardButton::callback("💰 Portfolio", cb::MENU_PORTFOLIO),
                InlineKeyboardButton::callback("🔔 Thresholds", cb::MENU_THRESHOLDS)
            ],
            vec![
                InlineKeyboardButton::callback("⏱ Set Threshold", cb::MENU_SET_THRESHOLD),
                InlineKeyboardButton::callback("❓ Help", cb::MENU_HELP)
            ]
        ]
    )
}

// One button per time window, then cancel
pub fn threshold_windows() -> InlineKeyboardMarkup {
    let windows: Vec<InlineKeyboardButton> = TimeWindow::all()
        .iter()
        .map(|w| InlineKeyboardButton::callback(w.label(), format!("{}:{}", cb::PERC_PREFIX, w.as_str())))
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = windows
        .chunks(3)
        .map(|chunk| chunk.to_vec())
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("❌ Cancel", cb::PERC_CANCEL)]);

    InlineKeyboardMarkup::new(rows)
}

pub fn clear_confirmation() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        vec![
            vec![
                InlineKeyboardButton::callback("🗑 Yes, clear", cb::CLEAR_CONFIRM),
                InlineKeyboardButton::callback("« Keep", cb::CLEAR_CANCEL)
            ]
        ]
    )
}

pub fn cancel_threshold() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("❌ Cancel", cb::PERC_CANCEL)]])
}
