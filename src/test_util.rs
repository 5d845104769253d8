#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only touched by tests holding HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Every character advances `self.0 * font_size` px.
#[cfg(test)]
pub(crate) struct FixedAdvance(pub f32);

#[cfg(test)]
impl crate::font::TextMeasure for FixedAdvance {
    fn measure(&self, text: &str, _font_family: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.0
    }
}
