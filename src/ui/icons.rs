//! Shared UI icons and emojis.
//!
//! Each icon has an ASCII fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");

// Stack indicators
pub static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[?]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");

// Cluster indicators
pub static NETWORK: Emoji<'_, '_> = Emoji("🌐 ", "[NET]");
pub static CLUSTER: Emoji<'_, '_> = Emoji("🐳 ", "[SWARM]");
