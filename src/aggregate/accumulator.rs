//! Running state of one aggregate function within one bucket.

use std::cmp::Ordering;

use crate::query::{AggregateFn, Value};

/// Integer sum that widens to float on overflow or on a float input.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    fn add(self, value: &Value) -> Sum {
        match (self, value) {
            (Sum::Int(acc), Value::Int(v)) => acc
                .checked_add(*v)
                .map_or(Sum::Float(acc as f64 + *v as f64), Sum::Int),
            (Sum::Int(acc), v) => match v.as_f64() {
                Some(f) => Sum::Float(acc as f64 + f),
                None => self,
            },
            (Sum::Float(acc), v) => match v.as_f64() {
                Some(f) => Sum::Float(acc + f),
                None => self,
            },
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Sum::Int(i) => i as f64,
            Sum::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Sum::Int(i) => Value::Int(i),
            Sum::Float(f) => Value::Float(f),
        }
    }
}

/// Accumulates the inputs of one aggregate call.
///
/// Null inputs are skipped by every function. `Count` and `Avg` divide by
/// the number of packets in the bucket, which the caller passes to
/// [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFn,
    sum: Sum,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    pub fn new(function: AggregateFn) -> Self {
        Self {
            function,
            sum: Sum::Int(0),
            min: None,
            max: None,
        }
    }

    pub fn function(&self) -> AggregateFn {
        self.function
    }

    pub fn update(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        match self.function {
            AggregateFn::Sum | AggregateFn::Avg => self.sum = self.sum.add(value),
            AggregateFn::Min => {
                let smaller = match &self.min {
                    None => true,
                    Some(current) => value.partial_compare(current) == Some(Ordering::Less),
                };
                if smaller {
                    self.min = Some(value.clone());
                }
            }
            AggregateFn::Max => {
                let larger = match &self.max {
                    None => true,
                    Some(current) => value.partial_compare(current) == Some(Ordering::Greater),
                };
                if larger {
                    self.max = Some(value.clone());
                }
            }
            AggregateFn::Count => {}
        }
    }

    /// Final value for a bucket of `packets` packets.
    pub fn finish(&self, packets: u64) -> Value {
        match self.function {
            AggregateFn::Count => Value::Int(packets as i64),
            AggregateFn::Sum => self.sum.into_value(),
            AggregateFn::Avg => {
                if packets == 0 {
                    Value::Null
                } else {
                    Value::Float(self.sum.as_f64() / packets as f64)
                }
            }
            AggregateFn::Min => self.min.clone().unwrap_or(Value::Null),
            AggregateFn::Max => self.max.clone().unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: AggregateFn, values: &[Value]) -> Value {
        let mut acc = Accumulator::new(function);
        for v in values {
            acc.update(v);
        }
        acc.finish(values.len() as u64)
    }

    #[test]
    fn test_sum_and_avg_skip_nulls() {
        let values = [Value::Int(10), Value::Null, Value::Int(20)];
        assert_eq!(run(AggregateFn::Sum, &values), Value::Int(30));
        // Average divides by the packet count, not the non-null count
        assert_eq!(run(AggregateFn::Avg, &values), Value::Float(10.0));
        assert_eq!(run(AggregateFn::Count, &values), Value::Int(3));
    }

    #[test]
    fn test_min_max() {
        let values = [Value::Int(7), Value::Null, Value::Int(3), Value::Int(9)];
        assert_eq!(run(AggregateFn::Min, &values), Value::Int(3));
        assert_eq!(run(AggregateFn::Max, &values), Value::Int(9));
    }

    #[test]
    fn test_min_max_without_values_are_null() {
        let values = [Value::Null, Value::Null];
        assert_eq!(run(AggregateFn::Min, &values), Value::Null);
        assert_eq!(run(AggregateFn::Max, &values), Value::Null);
        assert_eq!(run(AggregateFn::Avg, &[]), Value::Null);
        assert_eq!(run(AggregateFn::Sum, &[]), Value::Int(0));
    }

    #[test]
    fn test_sum_widens_on_overflow() {
        let values = [Value::Int(i64::MAX), Value::Int(1)];
        assert!(matches!(run(AggregateFn::Sum, &values), Value::Float(_)));
        let values = [Value::Int(1), Value::Float(0.5)];
        assert_eq!(run(AggregateFn::Sum, &values), Value::Float(1.5));
    }
}
