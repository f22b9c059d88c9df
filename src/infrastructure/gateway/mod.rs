mod simulated;

pub use simulated::SimulatedExchangeGateway;
