//! City scope → SQL conditions
//!
//! Entities either carry their own `city_id` or reach it through one
//! foreign key (rental or battery). Both shapes compile to
//! a single statement; the indirect one uses an `IN (SELECT …)` subquery.

use sea_orm::sea_query::Query;
use sea_orm::{ColumnTrait, Condition};

use crate::domain::access::CityScope;
use crate::infrastructure::database::entities::{battery, rental};

/// `city_id IN (…)` on the entity itself.
pub(crate) fn own_city<C: ColumnTrait>(city_col: C, scope: &CityScope) -> Condition {
    match scope.city_ids() {
        None => Condition::all(),
        Some(ids) => Condition::all().add(city_col.is_in(ids)),
    }
}

/// `rental_id IN (SELECT id FROM rentals WHERE city_id IN (…))`.
pub(crate) fn via_rental<C: ColumnTrait>(rental_fk: C, scope: &CityScope) -> Condition {
    match scope.city_ids() {
        None => Condition::all(),
        Some(ids) => Condition::all().add(
            rental_fk.in_subquery(
                Query::select()
                    .column(rental::Column::Id)
                    .from(rental::Entity)
                    .and_where(rental::Column::CityId.is_in(ids))
                    .to_owned(),
            ),
        ),
    }
}

/// `battery_id IN (SELECT id FROM batteries WHERE city_id IN (…))`.
pub(crate) fn via_battery<C: ColumnTrait>(battery_fk: C, scope: &CityScope) -> Condition {
    match scope.city_ids() {
        None => Condition::all(),
        Some(ids) => Condition::all().add(
            battery_fk.in_subquery(
                Query::select()
                    .column(battery::Column::Id)
                    .from(battery::Entity)
                    .and_where(battery::Column::CityId.is_in(ids))
                    .to_owned(),
            ),
        ),
    }
}
