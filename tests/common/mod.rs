use quadmap::Strategy;

/// Every implementation under test. The suite runs each behavioral check
/// against all four, since they share one contract.
pub const STRATEGIES: [Strategy; 4] = [
  Strategy::SerializedQueue,
  Strategy::CopyOnWrite,
  Strategy::CoarseMutex,
  Strategy::TwoLevel,
];
