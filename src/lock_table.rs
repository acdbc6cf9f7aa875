use crate::domain::Category;
use std::collections::HashSet;
use std::sync::Mutex;

/// One flag per refresh category. A category's routine only runs while it holds the guard.
#[derive(Debug, Default)]
pub struct LockTable {
    locked: Mutex<HashSet<Category>>,
}

impl LockTable {
    /// `None` when the category is already running.
    pub fn try_acquire(&self, category: Category) -> Option<LockGuard<'_>> {
        let mut locked = self.locked.lock().expect("lock table poisoned");
        locked.insert(category).then(|| LockGuard { table: self, category })
    }

    #[cfg(test)]
    pub fn is_locked(&self, category: Category) -> bool {
        self.locked.lock().expect("lock table poisoned").contains(&category)
    }
}

/// Releases the category when dropped, whatever way the routine ended.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    category: Category,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Must not panic while unwinding.
        if let Ok(mut locked) = self.table.locked.lock() {
            locked.remove(&self.category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn a_locked_category_cannot_be_acquired_again() {
        let table = LockTable::default();

        let guard = table.try_acquire(Category::Production);

        assert!(guard.is_some());
        assert!(table.try_acquire(Category::Production).is_none());
        assert!(table.try_acquire(Category::Home).is_some());
    }

    #[test]
    fn dropping_the_guard_releases_the_category() {
        let table = LockTable::default();

        let failing = || -> Result<(), String> {
            let _guard = table.try_acquire(Category::Inventory).ok_or("locked")?;
            Err("request failed".to_string())
        };

        assert!(failing().is_err());
        assert!(!table.is_locked(Category::Inventory));
    }

    #[test]
    fn a_panicking_routine_releases_the_category() {
        let table = LockTable::default();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = table.try_acquire(Category::Ensemble);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!table.is_locked(Category::Ensemble));
        assert!(table.try_acquire(Category::Ensemble).is_some());
    }
}
