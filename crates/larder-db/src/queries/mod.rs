pub mod families;
pub mod generation_locks;
pub mod grocery_lists;
pub mod meal_plans;
pub mod ratings;
pub mod recipes;
