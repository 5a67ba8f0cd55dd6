pub mod decision_engine;
pub mod privacy_decision;
pub mod risk_assessment;
