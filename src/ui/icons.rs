//! Shared UI icons.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static BOOK: Emoji<'_, '_> = Emoji("📖 ", "");
pub static TOOL: Emoji<'_, '_> = Emoji("🔧 ", "> ");
pub static ARROW: Emoji<'_, '_> = Emoji("➡️  ", "-> ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "* ");
