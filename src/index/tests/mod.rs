mod tests_avl;
mod tests_isam;
mod tests_manager;
