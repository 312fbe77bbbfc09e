//! Unit tests for the group scaler.
