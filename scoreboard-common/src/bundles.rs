use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    ops::{Index, IndexMut},
};

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Side {
    #[derivative(Default)]
    Home,
    Away,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            Self::Home => write!(f, "Home"),
            Self::Away => write!(f, "Away"),
        }
    }
}

/// One value per side of the board
#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeAwayBundle<T> {
    pub home: T,
    pub away: T,
}

impl<T> HomeAwayBundle<T> {
    pub fn new(home: T, away: T) -> Self {
        Self { home, away }
    }
}

impl<T> Index<Side> for HomeAwayBundle<T> {
    type Output = T;

    fn index(&self, side: Side) -> &Self::Output {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

impl<T> IndexMut<Side> for HomeAwayBundle<T> {
    fn index_mut(&mut self, side: Side) -> &mut Self::Output {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}
