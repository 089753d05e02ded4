//! Fixed payload supplier

use loadgen_core::DataSupplier;

/// Hands out a clone of the same request every time
#[derive(Debug, Clone)]
pub struct FixedSupplier<T> {
    request: T,
}

impl<T> FixedSupplier<T> {
    /// Create a supplier for `request`
    pub fn new(request: T) -> Self {
        Self { request }
    }
}

impl<T> DataSupplier<T> for FixedSupplier<T>
where
    T: Clone + Send + Sync,
{
    fn next(&self) -> T {
        self.request.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_supplier() {
        let supplier = FixedSupplier::new(serde_json::json!({"delta": 1}));
        assert_eq!(supplier.next(), supplier.next());
        assert_eq!(supplier.next()["delta"], 1);
    }
}
