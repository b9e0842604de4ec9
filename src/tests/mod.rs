mod rulelang;
