use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Debug)]
pub struct Expr(String);

impl Expr {
    #[inline]
    pub fn new(key: impl ToString) -> Self {
        Self(key.to_string())
    }

    #[inline]
    pub fn eq(self, value: impl ToString) -> Expression {
        Expression::Eq(self.0, value.to_string())
    }

    #[inline]
    pub fn in_(self, values: impl IntoIterator<Item = impl ToString>) -> Expression {
        Expression::In(self.0, values.into_iter().map(|v| v.to_string()).collect())
    }
}

#[derive(Clone, Debug)]
pub enum Expression {
    Eq(String, String),
    In(String, BTreeSet<String>),
}

impl Expression {
    fn key(&self) -> &str {
        match self {
            Self::Eq(key, _) | Self::In(key, _) => key,
        }
    }

    /// Docker label filters have no set operator, so `In` expands to nothing
    /// and callers scope by the remaining expressions.
    pub fn docker_filter(&self) -> Option<String> {
        match self {
            Self::Eq(key, value) => Some(format!("{key}={value}")),
            Self::In(..) => None,
        }
    }

    pub fn matches<'a>(&self, mut get: impl FnMut(&str) -> Option<&'a str>) -> bool {
        let value = get(self.key());
        match self {
            Self::Eq(_, expected) => value == Some(expected.as_str()),
            Self::In(_, values) => value.is_some_and(|value| values.contains(value)),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(key, value) => write!(f, "{key}={value}"),
            Self::In(key, values) => {
                let values = values.iter().map(String::as_str).collect::<Vec<_>>();
                write!(f, "{key} in ({})", values.join(","))
            }
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct Selector(Vec<Expression>);

impl Selector {
    pub fn with(&mut self, expr: impl Into<Expression>) -> &mut Self {
        self.0.push(expr.into());
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expression> {
        self.0.iter()
    }

    pub fn matches<'a>(&self, get: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.0.iter().all(|expr| expr.matches(&get))
    }
}

impl From<Expression> for Selector {
    fn from(expr: Expression) -> Self {
        Self(vec![expr])
    }
}

impl<K, V> From<(K, V)> for Expression
where
    K: ToString,
    V: ToString,
{
    fn from((key, value): (K, V)) -> Self {
        Self::Eq(key.to_string(), value.to_string())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exprs = self.0.iter().map(ToString::to_string).collect::<Vec<_>>();
        f.write_str(&exprs.join(","))
    }
}
