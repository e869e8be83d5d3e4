//! Model templates.

use rsrxn_core::compartments::Compartment;
use rsrxn_core::errors::RxnResult;
use rsrxn_core::model::Model;

/// Id of the compartment in [`one_compartment`].
pub const MAIN: &str = "main";

/// A well-mixed model with a single compartment called `main`.
pub fn one_compartment() -> RxnResult<Model> {
    Model::from_parts(vec![], vec![Compartment::new(MAIN)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_main_compartment() {
        let model = one_compartment().unwrap();
        assert!(model.compartment(MAIN).is_some());
        let flat = model.flatten().unwrap();
        assert_eq!(flat.n_compartments(), 1);
        assert_eq!(flat.ids().next().map(String::as_str), Some("main"));
    }
}
